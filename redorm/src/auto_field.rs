use crate::error::{AppError, ValidationError, ValueMismatch};
use crate::value::{TypeTag, Value};
use md5::{Digest, Md5};

pub const PRIMARY_KEY: &str = "id";

/// Derived primary key: md5 over the unique-together values, or a random token when there are none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoField {
    name: String,
    tag: TypeTag,
    unique_together: Vec<String>,
}

impl AutoField {
    pub fn new(unique_together: Vec<String>) -> Self {
        AutoField { name: PRIMARY_KEY.to_string(), tag: TypeTag::Str, unique_together }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn unique_together(&self) -> &[String] {
        &self.unique_together
    }

    pub fn bind<'a>(&'a self, fields: &'a [(String, Value)]) -> BoundAutoField<'a> {
        BoundAutoField { field: self, fields }
    }

    /// Accepts an identity read back from storage or passed explicitly.
    pub fn materialize(&self, value: Value) -> Result<String, ValidationError> {
        match value {
            Value::Str(id) => Ok(id),
            other => Err(ValidationError {
                field_name: self.name.clone(),
                value: other,
                cause: ValueMismatch::new(format!("It must be {}", self.tag)),
            }),
        }
    }

    pub fn before_set(&self, _value: Value) -> Result<Value, AppError> {
        Err(AppError::ReadOnlyField(self.name.clone()))
    }
}

pub struct BoundAutoField<'a> {
    field: &'a AutoField,
    fields: &'a [(String, Value)],
}

impl BoundAutoField<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.fields.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// `*`-joined text of present, truthy unique-together values in declaration order.
    pub fn hash_input(&self) -> String {
        self.field
            .unique_together
            .iter()
            .filter_map(|name| self.lookup(name))
            .filter(|value| value.is_truthy())
            .map(Value::text)
            .collect::<Vec<_>>()
            .join("*")
    }

    pub fn get_default_value(&self) -> String {
        if self.field.unique_together.is_empty() {
            format!("{:032x}", rand::random::<u128>())
        } else {
            hex::encode(Md5::digest(self.hash_input().as_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn unique(names: &[&str]) -> AutoField {
        AutoField::new(names.iter().map(|n| n.to_string()).collect())
    }

    #[test]
    fn hashes_unique_together_values_in_declared_order() {
        let field = unique(&["ids", "name"]);
        let fields = kwargs(&[("name", Value::from("John")), ("ids", Value::Int(1))]);
        let bound = field.bind(&fields);
        assert_eq!(bound.hash_input(), "1*John");
        assert_eq!(bound.get_default_value(), "db6dede12578a5795f59d25ea68a8289");

        let fields = kwargs(&[("ids", Value::Int(2)), ("name", Value::from("Jane"))]);
        assert_eq!(field.bind(&fields).get_default_value(), "44fab4c4efaeb5f5a751496de67e0285");
    }

    #[test]
    fn mixed_types_use_python_text() {
        let field = unique(&["b", "y", "f", "i", "s"]);
        let fields = kwargs(&[
            ("b", Value::Bool(true)),
            ("y", Value::bytes(*b"123")),
            ("f", Value::Float(1.0)),
            ("i", Value::Int(1)),
            ("s", Value::from("str")),
        ]);
        assert_eq!(field.bind(&fields).get_default_value(), "3db0d1cd0dfaf1fd1b6417c08f6b69c9");
    }

    #[test]
    fn falsy_and_absent_values_are_skipped() {
        let field = unique(&["email", "username", "age"]);
        let fields = kwargs(&[("email", Value::from("")), ("username", Value::from("str")), ("age", Value::Int(0))]);
        assert_eq!(field.bind(&fields).get_default_value(), "341be97d9aff90c9978347f66f945b77");

        let nothing: Vec<(String, Value)> = Vec::new();
        assert_eq!(field.bind(&nothing).get_default_value(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn empty_unique_together_yields_random_tokens() {
        let field = unique(&[]);
        let fields = kwargs(&[("a", Value::Int(1))]);
        let first = field.bind(&fields).get_default_value();
        let second = field.bind(&fields).get_default_value();
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn identity_is_read_only_and_textual() {
        let field = unique(&["a"]);
        assert!(matches!(field.before_set(Value::from("x")), Err(AppError::ReadOnlyField(ref n)) if n == "id"));
        assert_eq!(field.materialize(Value::from("abc")).unwrap(), "abc");
        let err = field.materialize(Value::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for id=3; It must be str.");
    }
}
