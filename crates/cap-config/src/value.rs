use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Typed configuration value.
///
/// Deserialization is untagged: `true` is a bool, integers that fit `i32` are
/// ints, larger integers are longs, other numbers are doubles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Floating point value.
    Double(f64),
    /// Text value.
    Str(String),
}

impl ParamValue {
    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Long(_) => "long",
            ParamValue::Double(_) => "double",
            ParamValue::Str(_) => "string",
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Int view.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Long view; ints widen.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(i64::from(*value)),
            ParamValue::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Double view; ints and longs widen.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParamValue::Int(value) => Some(f64::from(*value)),
            ParamValue::Long(value) => Some(*value as f64),
            ParamValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Long(value) => write!(f, "{value}L"),
            ParamValue::Double(value) => write!(f, "{value:?}"),
            ParamValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Long(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Double(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}
