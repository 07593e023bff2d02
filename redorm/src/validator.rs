use crate::error::{AppError, ValueMismatch};
use crate::value::{TypeTag, Value};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Checks a candidate value, returning the reason it is rejected.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ValueMismatch> + Send + Sync>;

pub static BUILTIN_VALIDATORS: Lazy<ValidatorRegistry> = Lazy::new(ValidatorRegistry::builtin);

#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<TypeTag, Validator>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        ValidatorRegistry::default()
    }

    pub fn builtin() -> Self {
        let mut registry = ValidatorRegistry::empty();
        for tag in TypeTag::ALL {
            registry.register(tag, type_validator(tag));
        }
        registry
    }

    pub fn register(&mut self, tag: TypeTag, validator: Validator) -> &mut Self {
        self.validators.insert(tag, validator);
        self
    }

    pub fn validator_for(&self, tag: TypeTag) -> Result<Validator, AppError> {
        self.validators.get(&tag).cloned().ok_or_else(|| AppError::UnsupportedType(tag.type_name().to_string()))
    }
}

fn expected_name(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Null => "None",
        other => other.type_name(),
    }
}

/// Strict variant check: an int is never a bool and never a float.
pub fn type_validator(tag: TypeTag) -> Validator {
    Arc::new(move |value: &Value| {
        let actual = value.tag();
        if actual == tag {
            Ok(())
        } else if tag.is_array() && actual.is_array() {
            Err(ValueMismatch::new(format!("It must be {}", tag.type_name())))
        } else if tag.is_array() {
            Err(ValueMismatch::new("It must be array"))
        } else {
            Err(ValueMismatch::new(format!("It must be {}", expected_name(tag))))
        }
    })
}

/// Fails when the value is greater than `bound`.
pub fn max_value(bound: impl Into<Value>) -> Validator {
    let bound = bound.into();
    Arc::new(move |value: &Value| match value.compare(&bound) {
        Some(Ordering::Greater) => Err(ValueMismatch::new(format!("It must be less than {}", bound.text()))),
        Some(_) => Ok(()),
        None => Err(ValueMismatch::new(format!("It must be comparable with {}", bound.repr()))),
    })
}

/// Fails when the value is less than `bound`.
pub fn min_value(bound: impl Into<Value>) -> Validator {
    let bound = bound.into();
    Arc::new(move |value: &Value| match value.compare(&bound) {
        Some(Ordering::Less) => Err(ValueMismatch::new(format!("It must be greater than {}", bound.text()))),
        Some(_) => Ok(()),
        None => Err(ValueMismatch::new(format!("It must be comparable with {}", bound.repr()))),
    })
}

pub fn predicate<F>(check: F) -> Validator
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Arc::new(move |value: &Value| if check(value) { Ok(()) } else { Err(ValueMismatch::new("Value is not valid")) })
}
