use crate::auto_field::{AutoField, PRIMARY_KEY};
use crate::debug;
use crate::error::AppError;
use crate::field::{BoundField, Field};
use crate::validator::{ValidatorRegistry, BUILTIN_VALIDATORS};
use crate::value::TypeTag;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub table_name: Option<String>,
    pub unique_together: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub name: String,
    pub tag: TypeTag,
    pub field: Option<Field>,
}

/// Declarative description of a model, turned into a [`ModelSchema`] by [`ModelDeclaration::build`].
#[derive(Debug, Clone)]
pub struct ModelDeclaration {
    name: String,
    fields: Vec<FieldDeclaration>,
    config: ModelConfig,
}

impl ModelDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDeclaration { name: name.into(), fields: Vec::new(), config: ModelConfig::default() }
    }

    pub fn field(self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.declare(name, tag, None)
    }

    pub fn field_with(self, name: impl Into<String>, tag: TypeTag, field: Field) -> Self {
        self.declare(name, tag, Some(field))
    }

    pub fn declare(mut self, name: impl Into<String>, tag: TypeTag, field: Option<Field>) -> Self {
        self.fields.push(FieldDeclaration { name: name.into(), tag, field });
        self
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.config.table_name = Some(table_name.into());
        self
    }

    pub fn unique_together<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.unique_together = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ModelSchema, AppError> {
        ModelSchema::build(self)
    }
}

/// Immutable per-model metadata shared by every instance and the manager.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    model_name: String,
    table_name: String,
    fields: Vec<BoundField>,
    identity: AutoField,
    required_fields: Vec<String>,
    optional_fields: Vec<String>,
}

pub fn generate_table_name(model_name: &str) -> String {
    format!("{}s", model_name.to_lowercase())
}

impl ModelSchema {
    pub fn build(declaration: ModelDeclaration) -> Result<ModelSchema, AppError> {
        ModelSchema::build_with(declaration, &BUILTIN_VALIDATORS)
    }

    pub fn build_with(declaration: ModelDeclaration, registry: &ValidatorRegistry) -> Result<ModelSchema, AppError> {
        let ModelDeclaration { name: model_name, fields: declarations, config } = declaration;
        if declarations.is_empty() {
            return Err(AppError::EmptyModel);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(declarations.len());
        for FieldDeclaration { name, tag, field } in declarations {
            if name == PRIMARY_KEY {
                return Err(AppError::ReservedField(name));
            }
            if !seen.insert(name.clone()) {
                return Err(AppError::DuplicateField(name));
            }
            fields.push(field.unwrap_or_default().bind(&name, tag, registry)?);
        }

        let unique_together = if config.unique_together.is_empty() {
            fields.iter().map(|f| f.name().to_string()).collect()
        } else {
            if let Some(unknown) = config.unique_together.iter().find(|name| !seen.contains(*name)) {
                return Err(AppError::InvalidConfig(format!("unique_together references {unknown}, which is not defined in {model_name}")));
            }
            config.unique_together
        };

        let (required, optional): (Vec<&BoundField>, Vec<&BoundField>) = fields.iter().partition(|f| f.is_required());
        let required_fields = required.into_iter().map(|f| f.name().to_string()).collect();
        let optional_fields = optional.into_iter().map(|f| f.name().to_string()).collect();
        let table_name = config.table_name.unwrap_or_else(|| generate_table_name(&model_name));

        debug!("Model {} bound to table {} with unique_together {:?}", model_name, table_name, unique_together);
        Ok(ModelSchema { model_name, table_name, fields, identity: AutoField::new(unique_together), required_fields, optional_fields })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Declared fields in declaration order, identity excluded.
    pub fn fields(&self) -> &[BoundField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(BoundField::name)
    }

    pub fn identity(&self) -> &AutoField {
        &self.identity
    }

    pub fn unique_together(&self) -> &[String] {
        self.identity.unique_together()
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = &BoundField> {
        self.optional_fields.iter().filter_map(|name| self.field(name))
    }

    /// `(name, type)` pairs in declaration order with the identity last.
    pub fn field_types(&self) -> Vec<(String, TypeTag)> {
        self.fields
            .iter()
            .map(|f| (f.name().to_string(), f.tag()))
            .chain(std::iter::once((self.identity.name().to_string(), self.identity.tag())))
            .collect()
    }

    /// True when `names` is exactly the unique-together set, order ignored.
    pub fn is_unique_together<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let given: HashSet<&str> = names.into_iter().collect();
        let expected: HashSet<&str> = self.unique_together().iter().map(String::as_str).collect();
        given == expected
    }
}
