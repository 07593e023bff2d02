use crate::error::{AppError, ValidationError};
use crate::validator::{self, Validator, ValidatorRegistry};
use crate::value::{TypeTag, Value};
use std::fmt;
use std::sync::Arc;

pub type Normalizer = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Unbound field declaration: defaults, normalizers and validators, without a name or type yet.
///
/// ```
/// use redorm::{Field, Value};
///
/// let age = Field::int().min_value(0).max_value(150);
/// let nickname = Field::string().default_value("anonymous").normalizer(|v| match v {
///     Value::Str(s) => Value::Str(s.trim().to_string()),
///     other => other,
/// });
/// assert!(age.is_required());
/// assert!(!nickname.is_required());
/// ```
#[derive(Clone, Default)]
pub struct Field {
    default: Option<Value>,
    default_factory: Option<DefaultFactory>,
    normalizers: Vec<Normalizer>,
    validators: Vec<Validator>,
    type_hint: Option<TypeTag>,
}

impl Field {
    pub fn new() -> Self {
        Field::default()
    }

    fn typed(tag: TypeTag) -> Self {
        Field { type_hint: Some(tag), validators: vec![validator::type_validator(tag)], ..Field::default() }
    }

    pub fn boolean() -> Self {
        Field::typed(TypeTag::Bool)
    }

    pub fn bytes() -> Self {
        Field::typed(TypeTag::Bytes)
    }

    pub fn date() -> Self {
        Field::typed(TypeTag::Date)
    }

    pub fn datetime() -> Self {
        Field::typed(TypeTag::DateTime)
    }

    pub fn float() -> Self {
        Field::typed(TypeTag::Float)
    }

    pub fn int() -> Self {
        Field::typed(TypeTag::Int)
    }

    pub fn null() -> Self {
        Field::typed(TypeTag::Null)
    }

    pub fn string() -> Self {
        Field::typed(TypeTag::Str)
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default_factory = Some(Arc::new(factory));
        self
    }

    pub fn normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.normalizers.push(Arc::new(normalizer));
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn predicate<F>(self, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator(validator::predicate(check))
    }

    pub fn min_value(self, bound: impl Into<Value>) -> Self {
        self.validator(validator::min_value(bound))
    }

    pub fn max_value(self, bound: impl Into<Value>) -> Self {
        self.validator(validator::max_value(bound))
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && self.default_factory.is_none()
    }

    /// Attaches the field to a model attribute; the type validator for `tag` always runs last.
    pub fn bind(self, name: &str, tag: TypeTag, registry: &ValidatorRegistry) -> Result<BoundField, AppError> {
        let default = match (self.default, self.default_factory) {
            (Some(_), Some(_)) => return Err(AppError::ConflictingDefaults),
            (Some(value), None) => DefaultValue::Value(value),
            (None, Some(factory)) => DefaultValue::Factory(factory),
            (None, None) => DefaultValue::Undefined,
        };
        let mut validators = self.validators;
        match self.type_hint {
            Some(hint) if hint != tag => {
                return Err(AppError::InvalidConfig(format!("{name} is declared as {tag} but built as a {hint} field")));
            }
            Some(_) => {}
            None => validators.push(registry.validator_for(tag)?),
        }
        Ok(BoundField { name: name.to_string(), tag, default, normalizers: self.normalizers, validators })
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("default", &self.default)
            .field("default_factory", &self.default_factory.is_some())
            .field("normalizers", &self.normalizers.len())
            .field("validators", &self.validators.len())
            .field("type_hint", &self.type_hint)
            .finish()
    }
}

#[derive(Clone)]
enum DefaultValue {
    Undefined,
    Value(Value),
    Factory(DefaultFactory),
}

/// A field attached to a model under a name and a declared type.
#[derive(Clone)]
pub struct BoundField {
    name: String,
    tag: TypeTag,
    default: DefaultValue,
    normalizers: Vec<Normalizer>,
    validators: Vec<Validator>,
}

impl BoundField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, DefaultValue::Undefined)
    }

    /// Static default, else a fresh factory value, else null.
    pub fn get_default_value(&self) -> Value {
        match &self.default {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
            DefaultValue::Undefined => Value::Null,
        }
    }

    pub fn before_set(&self, value: Value) -> Result<Value, ValidationError> {
        let value = self.normalizers.iter().fold(value, |acc, normalize| normalize(acc));
        for validate in &self.validators {
            if let Err(cause) = validate(&value) {
                return Err(ValidationError { field_name: self.name.clone(), value, cause });
            }
        }
        Ok(value)
    }
}

impl fmt::Display for BoundField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field('{}', '{}')", self.name, self.tag)
    }
}

impl fmt::Debug for BoundField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundField")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("required", &self.is_required())
            .field("validators", &self.validators.len())
            .finish()
    }
}
