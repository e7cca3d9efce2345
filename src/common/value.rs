use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampNanosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampNanosecondType, UInt64Type};
use serde::{Deserialize, Serialize};

use crate::common::time::Time;
use crate::error::{Error, Result};

/// Column types a group key can carry. The discriminant is the type ordinal
/// used to order keys whose columns share a label but not a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ColType {
    Bool = 1,
    Int = 2,
    UInt = 3,
    Float = 4,
    String = 5,
    Time = 6,
}

impl ColType {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColType::Bool => DataType::Boolean,
            ColType::Int => DataType::Int64,
            ColType::UInt => DataType::UInt64,
            ColType::Float => DataType::Float64,
            ColType::String => DataType::Utf8,
            ColType::Time => DataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }
}

impl TryFrom<&DataType> for ColType {
    type Error = Error;

    fn try_from(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Boolean => Ok(ColType::Bool),
            DataType::Int64 => Ok(ColType::Int),
            DataType::UInt64 => Ok(ColType::UInt),
            DataType::Float64 => Ok(ColType::Float),
            DataType::Utf8 => Ok(ColType::String),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => Ok(ColType::Time),
            other => Err(Error::UnsupportedType(format!("{} as a key column", other))),
        }
    }
}

impl fmt::Display for ColType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColType::Bool => "bool",
            ColType::Int => "int",
            ColType::UInt => "uint",
            ColType::Float => "float",
            ColType::String => "string",
            ColType::Time => "time",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColMeta {
    pub label: String,
    pub col_type: ColType,
}

impl ColMeta {
    pub fn new(label: impl Into<String>, col_type: ColType) -> Self {
        Self { label: label.into(), col_type }
    }
}

/// A nullable scalar stored in a group key column.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(Time),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type of a non-null value.
    pub fn col_type(&self) -> Option<ColType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ColType::Bool),
            Value::Int(_) => Some(ColType::Int),
            Value::UInt(_) => Some(ColType::UInt),
            Value::Float(_) => Some(ColType::Float),
            Value::String(_) => Some(ColType::String),
            Value::Time(_) => Some(ColType::Time),
        }
    }

    /// Null is compatible with every column type.
    pub fn is_compatible(&self, col_type: ColType) -> bool {
        self.col_type().map_or(true, |t| t == col_type)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// Orders two non-null values of the same type. Floats use the IEEE total
    /// order. Values of different types fall back to their type ordinal.
    pub(crate) fn cmp_same_type(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (a, b) => a.col_type().cmp(&b.col_type()),
        }
    }

    /// Reads the value at `row` of an arrow array of a supported key type.
    pub fn from_array(array: &dyn Array, row: usize) -> Result<Value> {
        let col_type = ColType::try_from(array.data_type())?;
        if array.is_null(row) {
            return Ok(Value::Null);
        }
        let value = match col_type {
            ColType::Bool => Value::Bool(array.as_boolean().value(row)),
            ColType::Int => Value::Int(array.as_primitive::<Int64Type>().value(row)),
            ColType::UInt => Value::UInt(array.as_primitive::<UInt64Type>().value(row)),
            ColType::Float => Value::Float(array.as_primitive::<Float64Type>().value(row)),
            ColType::String => Value::String(array.as_string::<i32>().value(row).to_string()),
            ColType::Time => Value::Time(Time(array.as_primitive::<TimestampNanosecondType>().value(row))),
        };
        Ok(value)
    }

    /// Builds an arrow array of `col_type` holding `values`. Incompatible
    /// values are rejected.
    pub fn to_array(values: &[Value], col_type: ColType) -> Result<ArrayRef> {
        if let Some(bad) = values.iter().find(|v| !v.is_compatible(col_type)) {
            return Err(Error::InvalidGroupKey(format!(
                "value {} is not compatible with column type {}",
                bad, col_type
            )));
        }
        let array: ArrayRef = match col_type {
            ColType::Bool => Arc::new(values.iter().map(Value::as_bool).collect::<BooleanArray>()),
            ColType::Int => Arc::new(values.iter().map(Value::as_int).collect::<Int64Array>()),
            ColType::UInt => Arc::new(values.iter().map(Value::as_uint).collect::<UInt64Array>()),
            ColType::Float => Arc::new(values.iter().map(Value::as_float).collect::<Float64Array>()),
            ColType::String => Arc::new(values.iter().map(Value::as_str).collect::<StringArray>()),
            ColType::Time => Arc::new(
                values
                    .iter()
                    .map(|v| v.as_time().map(Time::nanos))
                    .collect::<TimestampNanosecondArray>(),
            ),
        };
        Ok(array)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) => a.col_type() == b.col_type() && a.cmp_same_type(b) == Ordering::Equal,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Time(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Time> for Value {
    fn from(v: Time) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
