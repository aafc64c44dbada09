//! Value-type registry: tag resolution, slot lookup and the validation rules
//! applied before a value is written.

use chrono::{DateTime, Utc};
use warehouse_core::{
    parsers::{format_timestamp, parse_timestamp},
    Slot, ValueType,
};

use crate::{data::Value, executor::SqlValue, WarehouseError, WarehouseResult};

/// Resolves a raw tag read from the store or supplied by a caller.
pub fn value_type_for(tag: i64) -> WarehouseResult<ValueType> {
    ValueType::from_tag(tag).ok_or(WarehouseError::UnknownValueType(tag))
}

/// `(table, column)` holding values with the given tag.
pub fn slot_for(tag: i64) -> WarehouseResult<(&'static str, &'static str)> {
    let slot = value_type_for(tag)?.slot();
    Ok((slot.table(), slot.column()))
}

/// A validated value, shaped for the slot it will be written to.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// Bound to `measurement.valinteger`.
    Integer(i64),
    /// Bound to `measurement.valreal`.
    Real(f64),
    /// Written to `textvalue.textval`.
    Text(String),
    /// Written to `datetimevalue.datetimeval`, already formatted.
    DateTime(String),
}
impl SlotValue {
    pub(crate) fn integer(&self) -> SqlValue {
        match self {
            Self::Integer(v) => SqlValue::Integer(*v),
            _ => SqlValue::Null,
        }
    }
    pub(crate) fn real(&self) -> SqlValue {
        match self {
            Self::Real(v) => SqlValue::Real(*v),
            _ => SqlValue::Null,
        }
    }
    /// Table and bound value for the secondary insert, if this slot needs one.
    pub(crate) fn secondary(&self) -> Option<(&'static str, SqlValue)> {
        match self {
            Self::Text(v) => Some(("textvalue", SqlValue::Text(v.clone()))),
            Self::DateTime(v) => Some(("datetimevalue", SqlValue::Text(v.clone()))),
            Self::Integer(_) | Self::Real(_) => None,
        }
    }
}

/// Checks `value` against the rules of `value_type` and converts it for storage.
pub fn validate(value_type: ValueType, value: &Value) -> WarehouseResult<SlotValue> {
    let mismatch = || WarehouseError::ValueMismatch {
        value_type,
        value: value.to_string(),
    };
    let slot_value = match (value_type.slot(), value) {
        (Slot::Integer, Value::Int(v)) => SlotValue::Integer(*v),
        (Slot::Integer, Value::Bool(v)) => SlotValue::Integer(i64::from(*v)),
        (Slot::Real, Value::Real(v)) => SlotValue::Real(*v),
        #[allow(clippy::cast_precision_loss)]
        (Slot::Real, Value::Int(v)) => SlotValue::Real(*v as f64),
        (Slot::Text, Value::Text(v)) => SlotValue::Text(v.clone()),
        (Slot::DateTime, Value::Time(v)) => SlotValue::DateTime(format_timestamp(v)),
        (Slot::DateTime, Value::Text(v)) => {
            let parsed = parse_timestamp(v).map_err(|_| mismatch())?;
            SlotValue::DateTime(format_timestamp(&parsed))
        }
        _ => return Err(mismatch()),
    };
    if value_type == ValueType::Boolean {
        if let SlotValue::Integer(v) = slot_value {
            if v != 0 && v != 1 {
                return Err(WarehouseError::InvalidBooleanValue(v));
            }
        }
    }
    Ok(slot_value)
}

/// Decodes the stored slot columns of one measurement row.
pub(crate) fn decode(
    value_type: ValueType,
    integer: Option<i64>,
    real: Option<f64>,
    text: Option<String>,
    datetime: Option<DateTime<Utc>>,
) -> Option<Value> {
    match value_type.slot() {
        Slot::Integer if value_type == ValueType::Boolean => integer.map(|v| Value::Bool(v != 0)),
        Slot::Integer => integer.map(Value::Int),
        Slot::Real => real.map(Value::Real),
        Slot::Text => text.map(Value::Text),
        Slot::DateTime => datetime.map(Value::Time),
    }
}
