//! Runtime value types carried by requests, backend rows and entity results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The wire-level kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    /// Null of unknown kind. Backends report null strings this way.
    NullString,
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Long,
    /// 64-bit floating point.
    Double,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    /// Array of strings.
    StringArray,
    /// Array of 64-bit integers.
    LongArray,
    /// Array of 64-bit floats.
    DoubleArray,
    /// Array of booleans.
    BoolArray,
    /// String to string map.
    StringMap,
}

/// A runtime value that can be serialized over the wire.
///
/// Backends of the analytic kind tend to return every cell as a string; the
/// gateway converts those to the kind the attribute catalog declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Value {
    /// Null value.
    Null,
    /// UTF-8 string.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Long(i64),
    /// 64-bit floating point.
    Double(f64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of 64-bit integers.
    LongArray(Vec<i64>),
    /// Array of 64-bit floats.
    DoubleArray(Vec<f64>),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// String to string map.
    StringMap(BTreeMap<String, String>),
}

impl Value {
    /// The wire-level kind of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::NullString,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::StringArray(_) => ValueType::StringArray,
            Value::LongArray(_) => ValueType::LongArray,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::BoolArray(_) => ValueType::BoolArray,
            Value::StringMap(_) => ValueType::StringMap,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Long(v) | Value::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as a string slice array.
    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(v) | Value::Timestamp(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::StringArray(values) => write!(f, "[{}]", values.join(", ")),
            Value::LongArray(values) => write_list(f, values),
            Value::DoubleArray(values) => write_list(f, values),
            Value::BoolArray(values) => write_list(f, values),
            Value::StringMap(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    write!(f, "]")
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
