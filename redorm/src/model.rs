use crate::auto_field::PRIMARY_KEY;
use crate::error::{AppError, ValidationError, ValueMismatch};
use crate::manager::RecordManager;
use crate::schema::ModelSchema;
use crate::value::Value;
use crate::Kwargs;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A validated instance of a declared model, tied to the manager it was built through.
#[derive(Clone)]
pub struct Model {
    objects: RecordManager,
    id: String,
    values: HashMap<String, Value>,
}

impl Model {
    /// Rejects undeclared names, fills optional defaults, requires the rest,
    /// validates in declaration order and resolves the identity last.
    pub fn new(objects: &RecordManager, kwargs: Kwargs) -> Result<Self, AppError> {
        let schema = objects.schema();
        if let Some((name, _)) = kwargs.iter().find(|(name, _)| name != PRIMARY_KEY && schema.field(name).is_none()) {
            return Err(AppError::UnnecessaryParams(format!("{} is not defined in {}", name, schema.model_name())));
        }
        let mut supplied: HashMap<String, Value> = kwargs.into_iter().collect();
        let explicit_id = supplied.remove(PRIMARY_KEY);

        for field in schema.optional_fields() {
            if !supplied.contains_key(field.name()) {
                supplied.insert(field.name().to_string(), field.get_default_value());
            }
        }
        if let Some(missing) = schema.required_fields().iter().find(|name| !supplied.contains_key(name.as_str())) {
            return Err(AppError::MissingField(missing.clone()));
        }

        let mut values = HashMap::with_capacity(schema.fields().len());
        for field in schema.fields() {
            if let Some(raw) = supplied.remove(field.name()) {
                values.insert(field.name().to_string(), field.before_set(raw)?);
            }
        }

        let id = match explicit_id {
            Some(id) => schema.identity().materialize(id)?,
            None => {
                let ordered: Kwargs = schema
                    .fields()
                    .iter()
                    .filter_map(|field| values.get(field.name()).map(|value| (field.name().to_string(), value.clone())))
                    .collect();
                schema.identity().bind(&ordered).get_default_value()
            }
        };
        Ok(Model { objects: objects.clone(), id, values })
    }

    /// Rebuilds a stored record. Values are only checked against the declared column types;
    /// normalizers and validators already ran before the record was saved.
    pub(crate) fn from_record(objects: &RecordManager, record: Kwargs) -> Result<Self, AppError> {
        let schema = objects.schema();
        let mut id = None;
        let mut values = HashMap::with_capacity(record.len());
        for (name, value) in record {
            if name == PRIMARY_KEY {
                id = Some(schema.identity().materialize(value)?);
                continue;
            }
            let field = schema.field(&name).ok_or_else(|| AppError::UnknownField(name.clone()))?;
            if value.tag() != field.tag() {
                let cause = ValueMismatch::new(format!("It must be {}", field.tag()));
                return Err(ValidationError { field_name: name, value, cause }.into());
            }
            values.insert(name, value);
        }
        let id = id.ok_or_else(|| AppError::Codec(format!("stored {} record has no {}", schema.model_name(), PRIMARY_KEY)))?;
        Ok(Model { objects: objects.clone(), id, values })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn objects(&self) -> &RecordManager {
        &self.objects
    }

    pub fn schema(&self) -> &ModelSchema {
        self.objects.schema()
    }

    /// Current value; an unset optional field yields a fresh default on every read.
    pub fn get(&self, name: &str) -> Result<Value, AppError> {
        if name == PRIMARY_KEY {
            return Ok(Value::Str(self.id.clone()));
        }
        let field = self.schema().field(name).ok_or_else(|| AppError::UnknownField(name.to_string()))?;
        Ok(self.values.get(name).cloned().unwrap_or_else(|| field.get_default_value()))
    }

    fn prepare(&self, name: &str, value: Value) -> Result<Value, AppError> {
        if name == PRIMARY_KEY {
            return Err(AppError::ReadOnlyField(name.to_string()));
        }
        let field = self.schema().field(name).ok_or_else(|| AppError::UnknownField(name.to_string()))?;
        Ok(field.before_set(value)?)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AppError> {
        let value = self.prepare(name, value.into())?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Forgets the explicit value so reads fall back to the default. Required fields have none.
    pub fn reset(&mut self, name: &str) -> Result<(), AppError> {
        if name == PRIMARY_KEY {
            return Err(AppError::ReadOnlyField(name.to_string()));
        }
        let field = self.schema().field(name).ok_or_else(|| AppError::UnknownField(name.to_string()))?;
        if field.is_required() {
            return Err(AppError::MissingField(name.to_string()));
        }
        self.values.remove(name);
        Ok(())
    }

    /// Declared fields in declaration order, identity excluded.
    pub fn fields(&self) -> Kwargs {
        self.schema()
            .fields()
            .iter()
            .map(|field| {
                let value = self.values.get(field.name()).cloned().unwrap_or_else(|| field.get_default_value());
                (field.name().to_string(), value)
            })
            .collect()
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.objects.save(&self.id, &self.fields())
    }

    /// Validates every pair before assigning any of them, then saves. The identity is not recomputed.
    pub fn update(&mut self, kwargs: Kwargs) -> Result<(), AppError> {
        let prepared = kwargs
            .into_iter()
            .map(|(name, value)| Ok((self.prepare(&name, value)?, name)))
            .collect::<Result<Vec<_>, AppError>>()?;
        for (value, name) in prepared {
            self.values.insert(name, value);
        }
        self.save()
    }

    pub fn delete(self) -> Result<(), AppError> {
        self.objects.delete(&self.id)
    }

    pub fn refetch(&self) -> Result<Model, AppError> {
        self.objects.get(&self.id)
    }

    pub(crate) fn matches(&self, constraints: &[(String, Value)]) -> bool {
        constraints.iter().all(|(name, expected)| self.get(name).is_ok_and(|actual| &actual == expected))
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.schema().model_name() == other.schema().model_name() && self.id == other.id && self.fields() == other.fields()
    }
}

impl Eq for Model {}

impl Hash for Model {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields().iter().map(|(name, value)| format!("{}={}", name, value.repr())).collect::<Vec<_>>().join(", ");
        write!(f, "{}({})", self.schema().model_name(), fields)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.schema().model_name()).field("id", &self.id).field("fields", &self.fields()).finish()
    }
}
