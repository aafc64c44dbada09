//! Measurement values as seen by callers.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;
use warehouse_core::parsers::{format_timestamp, parse_timestamp};

use crate::executor::SqlValue;

/// A measurement value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer, category code or bounded integer.
    Int(i64),
    /// Real or bounded real.
    Real(f64),
    /// Boolean (stored as 0 or 1).
    Bool(bool),
    /// Text or external reference.
    Text(String),
    /// Datetime or bounded datetime.
    Time(DateTime<Utc>),
}

impl Value {
    /// Returns the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(v) = self {
            Some(*v)
        } else {
            None
        }
    }
    /// Returns the real payload, if this is a real.
    pub fn as_real(&self) -> Option<f64> {
        if let Value::Real(v) = self {
            Some(*v)
        } else {
            None
        }
    }
    /// Returns the boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(v) = self {
            Some(*v)
        } else {
            None
        }
    }
    /// Returns the text payload, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(v) = self {
            Some(v)
        } else {
            None
        }
    }
    /// Returns the timestamp payload, if this is a datetime.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        if let Value::Time(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    /// The parameter this value binds as in a query.
    pub(crate) fn to_sql_value(&self) -> SqlValue {
        match self {
            Value::Int(v) => SqlValue::Integer(*v),
            Value::Real(v) => SqlValue::Real(*v),
            Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
            Value::Text(v) => SqlValue::Text(v.clone()),
            Value::Time(v) => SqlValue::Text(format_timestamp(v)),
        }
    }

    /// Converts a scalar query result, parsing text as a timestamp when
    /// `as_time` is set and the text is a valid timestamp.
    pub(crate) fn from_sql_value(value: SqlValue, as_time: bool) -> Option<Value> {
        match value {
            SqlValue::Null | SqlValue::Blob(_) => None,
            SqlValue::Integer(v) => Some(Value::Int(v)),
            SqlValue::Real(v) => Some(Value::Real(v)),
            SqlValue::Text(v) if as_time => Some(
                parse_timestamp(&v)
                    .map(Value::Time)
                    .unwrap_or(Value::Text(v)),
            ),
            SqlValue::Text(v) => Some(Value::Text(v)),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Time(v) => write!(f, "'{}'", format_timestamp(v)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}
