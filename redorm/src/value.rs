use crate::error::AppError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Declared type of a model field. The type name is what lands in the schema header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Bool,
    Bytes,
    Date,
    DateTime,
    Float,
    Int,
    Null,
    Str,
    IntArray,
    FloatArray,
    StrArray,
}

impl TypeTag {
    pub const ALL: [TypeTag; 11] = [
        TypeTag::Bool,
        TypeTag::Bytes,
        TypeTag::Date,
        TypeTag::DateTime,
        TypeTag::Float,
        TypeTag::Int,
        TypeTag::Null,
        TypeTag::Str,
        TypeTag::IntArray,
        TypeTag::FloatArray,
        TypeTag::StrArray,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Bytes => "bytes",
            TypeTag::Date => "date",
            TypeTag::DateTime => "datetime",
            TypeTag::Float => "float",
            TypeTag::Int => "int",
            TypeTag::Null => "null",
            TypeTag::Str => "str",
            TypeTag::IntArray => "array[int]",
            TypeTag::FloatArray => "array[float]",
            TypeTag::StrArray => "array[str]",
        }
    }

    pub fn from_type_name(name: &str) -> Option<TypeTag> {
        TypeTag::ALL.iter().copied().find(|tag| tag.type_name() == name)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeTag::IntArray | TypeTag::FloatArray | TypeTag::StrArray)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for TypeTag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::from_type_name(s).ok_or_else(|| AppError::UnsupportedType(s.to_string()))
    }
}

/// A materialized field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Float(f64),
    Int(i64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
}

impl Value {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(bytes.into())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Date(_) => TypeTag::Date,
            Value::DateTime(_) => TypeTag::DateTime,
            Value::Float(_) => TypeTag::Float,
            Value::Int(_) => TypeTag::Int,
            Value::Str(_) => TypeTag::Str,
            Value::IntArray(_) => TypeTag::IntArray,
            Value::FloatArray(_) => TypeTag::FloatArray,
            Value::StrArray(_) => TypeTag::StrArray,
        }
    }

    /// Python truthiness; falsy values are left out of unique-together hashing.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Bytes(b) => !b.is_empty(),
            Value::Date(_) | Value::DateTime(_) => true,
            Value::Float(f) => *f != 0.0,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::IntArray(a) => !a.is_empty(),
            Value::FloatArray(a) => !a.is_empty(),
            Value::StrArray(a) => !a.is_empty(),
        }
    }

    /// Python `str(value)`. This exact text feeds identity hashing, so it must stay stable.
    pub fn text(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Bytes(b) => bytes_repr(b),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => {
                let micros = dt.nanosecond() / 1_000;
                if micros == 0 {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    format!("{}.{:06}", dt.format("%Y-%m-%d %H:%M:%S"), micros)
                }
            }
            Value::Float(f) => float_text(*f),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::IntArray(_) | Value::FloatArray(_) | Value::StrArray(_) => self.repr(),
        }
    }

    /// Python `repr(value)`, used in validation messages and model display.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => str_repr(s),
            Value::Date(d) => format!("datetime.date({}, {}, {})", d.year(), d.month(), d.day()),
            Value::DateTime(dt) => {
                let mut parts = vec![
                    dt.year().to_string(),
                    dt.month().to_string(),
                    dt.day().to_string(),
                    dt.hour().to_string(),
                    dt.minute().to_string(),
                ];
                let micros = dt.nanosecond() / 1_000;
                if dt.second() != 0 || micros != 0 {
                    parts.push(dt.second().to_string());
                }
                if micros != 0 {
                    parts.push(micros.to_string());
                }
                format!("datetime.datetime({})", parts.join(", "))
            }
            Value::IntArray(items) => array_repr(items.iter().map(|i| i.to_string())),
            Value::FloatArray(items) => array_repr(items.iter().map(|f| float_text(*f))),
            Value::StrArray(items) => array_repr(items.iter().map(|s| str_repr(s))),
            other => other.text(),
        }
    }

    /// Ordering used by range validators; ints and floats compare across each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Python float `str`: `1.0`, `0.1`, `1e+16`, `1e-05`, `inf`, `nan`.
pub(crate) fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let debug = format!("{value:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}

fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

fn str_repr(s: &str) -> String {
    let quote = pick_quote(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let quote = pick_quote(bytes.contains(&b'\''), bytes.contains(&b'"'));
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(b as char),
            b => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote);
    out
}

fn array_repr(items: impl Iterator<Item = String>) -> String {
    format!("array({})", items.collect::<Vec<_>>().join(", "))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

/// Keeps microsecond precision, the finest the stored form carries.
impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value.with_nanosecond(value.nanosecond() / 1_000 * 1_000).unwrap_or(value))
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Value::IntArray(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::FloatArray(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::StrArray(value)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
