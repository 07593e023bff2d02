use crate::error::AppError;
use crate::value::{float_text, TypeTag, Value};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

pub const NULL_TOKEN: &str = "null";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATETIME_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub type SerializeFn = fn(&Value) -> Result<String, AppError>;
pub type DeserializeFn = fn(&str) -> Result<Value, AppError>;

/// Pair of conversions between a [`Value`] and its persisted text.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub serialize: SerializeFn,
    pub deserialize: DeserializeFn,
}

#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<TypeTag, Codec>,
}

pub static BUILTIN_CODECS: Lazy<Arc<CodecRegistry>> = Lazy::new(|| Arc::new(CodecRegistry::builtin()));

impl CodecRegistry {
    pub fn empty() -> Self {
        CodecRegistry::default()
    }

    pub fn builtin() -> Self {
        let mut registry = CodecRegistry::empty();
        registry
            .register(TypeTag::Bool, encode_bool, decode_bool)
            .register(TypeTag::Bytes, encode_bytes, decode_bytes)
            .register(TypeTag::Date, encode_date, decode_date)
            .register(TypeTag::DateTime, encode_datetime, decode_datetime)
            .register(TypeTag::Float, encode_float, decode_float)
            .register(TypeTag::Int, encode_int, decode_int)
            .register(TypeTag::Null, encode_null, decode_null)
            .register(TypeTag::Str, encode_str, decode_str)
            .register(TypeTag::IntArray, encode_int_array, decode_int_array)
            .register(TypeTag::FloatArray, encode_float_array, decode_float_array)
            .register(TypeTag::StrArray, encode_str_array, decode_str_array);
        registry
    }

    pub fn register(&mut self, tag: TypeTag, serialize: SerializeFn, deserialize: DeserializeFn) -> &mut Self {
        self.codecs.insert(tag, Codec { serialize, deserialize });
        self
    }

    pub fn get(&self, tag: TypeTag) -> Result<Codec, AppError> {
        self.codecs.get(&tag).copied().ok_or_else(|| AppError::UnsupportedType(tag.type_name().to_string()))
    }

    pub fn serialize(&self, tag: TypeTag, value: &Value) -> Result<String, AppError> {
        (self.get(tag)?.serialize)(value)
    }

    pub fn deserialize(&self, tag: TypeTag, text: &str) -> Result<Value, AppError> {
        (self.get(tag)?.deserialize)(text)
    }
}

fn mismatch(expected: TypeTag, value: &Value) -> AppError {
    AppError::Codec(format!("cannot encode {} value {} as {}", value.tag(), value.repr(), expected))
}

fn malformed(expected: TypeTag, text: &str, reason: impl std::fmt::Display) -> AppError {
    AppError::Codec(format!("cannot decode '{}' as {}: {}", text, expected, reason))
}

fn encode_bool(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        other => Err(mismatch(TypeTag::Bool, other)),
    }
}

fn decode_bool(text: &str) -> Result<Value, AppError> {
    match text {
        "True" => Ok(Value::Bool(true)),
        "False" => Ok(Value::Bool(false)),
        other => Err(malformed(TypeTag::Bool, other, "expected True or False")),
    }
}

// Only UTF-8 content is representable.
fn encode_bytes(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map_err(|e| AppError::Codec(format!("cannot encode {} as utf-8 text: {}", value.repr(), e))),
        other => Err(mismatch(TypeTag::Bytes, other)),
    }
}

fn decode_bytes(text: &str) -> Result<Value, AppError> {
    Ok(Value::Bytes(text.as_bytes().to_vec()))
}

fn encode_date(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Date(date) => Ok(date.format(DATE_FORMAT).to_string()),
        other => Err(mismatch(TypeTag::Date, other)),
    }
}

fn decode_date(text: &str) -> Result<Value, AppError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map(Value::Date).map_err(|e| malformed(TypeTag::Date, text, e))
}

fn encode_datetime(value: &Value) -> Result<String, AppError> {
    match value {
        Value::DateTime(datetime) => {
            let seconds = datetime.format(DATETIME_SECONDS_FORMAT);
            match datetime.nanosecond() / 1_000 {
                0 => Ok(seconds.to_string()),
                micros => Ok(format!("{seconds}.{micros:06}")),
            }
        }
        other => Err(mismatch(TypeTag::DateTime, other)),
    }
}

fn decode_datetime(text: &str) -> Result<Value, AppError> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .map(Value::DateTime)
        .map_err(|e| malformed(TypeTag::DateTime, text, e))
}

fn encode_float(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Float(f) => Ok(float_text(*f)),
        other => Err(mismatch(TypeTag::Float, other)),
    }
}

fn decode_float(text: &str) -> Result<Value, AppError> {
    text.parse::<f64>().map(Value::Float).map_err(|e| malformed(TypeTag::Float, text, e))
}

fn encode_int(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Int(i) => Ok(i.to_string()),
        other => Err(mismatch(TypeTag::Int, other)),
    }
}

fn decode_int(text: &str) -> Result<Value, AppError> {
    text.parse::<i64>().map(Value::Int).map_err(|e| malformed(TypeTag::Int, text, e))
}

fn encode_null(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Null => Ok(NULL_TOKEN.to_string()),
        other => Err(mismatch(TypeTag::Null, other)),
    }
}

fn decode_null(text: &str) -> Result<Value, AppError> {
    if text == NULL_TOKEN {
        Ok(Value::Null)
    } else {
        Err(malformed(TypeTag::Null, text, "expected null"))
    }
}

fn encode_str(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(mismatch(TypeTag::Str, other)),
    }
}

fn decode_str(text: &str) -> Result<Value, AppError> {
    Ok(Value::Str(text.to_string()))
}

fn encode_int_array(value: &Value) -> Result<String, AppError> {
    match value {
        Value::IntArray(items) => Ok(serde_json::to_string(items)?),
        other => Err(mismatch(TypeTag::IntArray, other)),
    }
}

fn decode_int_array(text: &str) -> Result<Value, AppError> {
    serde_json::from_str::<Vec<i64>>(text).map(Value::IntArray).map_err(|e| malformed(TypeTag::IntArray, text, e))
}

fn encode_float_array(value: &Value) -> Result<String, AppError> {
    match value {
        Value::FloatArray(items) if items.iter().all(|f| f.is_finite()) => Ok(serde_json::to_string(items)?),
        Value::FloatArray(_) => Err(AppError::Codec(format!("{} cannot hold non-finite values", TypeTag::FloatArray))),
        other => Err(mismatch(TypeTag::FloatArray, other)),
    }
}

fn decode_float_array(text: &str) -> Result<Value, AppError> {
    serde_json::from_str::<Vec<f64>>(text).map(Value::FloatArray).map_err(|e| malformed(TypeTag::FloatArray, text, e))
}

fn encode_str_array(value: &Value) -> Result<String, AppError> {
    match value {
        Value::StrArray(items) => Ok(serde_json::to_string(items)?),
        other => Err(mismatch(TypeTag::StrArray, other)),
    }
}

fn decode_str_array(text: &str) -> Result<Value, AppError> {
    serde_json::from_str::<Vec<String>>(text).map(Value::StrArray).map_err(|e| malformed(TypeTag::StrArray, text, e))
}
