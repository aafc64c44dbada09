//! Records returned by the read path.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use warehouse_core::{Id, ValueType};

use crate::data::Value;

/// One stored measurement as returned by the read path.
///
/// Field order is the stable contract consumed by downstream reporting:
/// `id, time, study, participant, measurement_type, type_name,
/// measurement_group, group_instance, trial, value_type, value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Store-assigned measurement id.
    pub id: Id,
    /// Time the value was recorded.
    pub time: DateTime<Utc>,
    /// Owning study.
    pub study: Id,
    /// Participant the value belongs to, if any.
    pub participant: Option<Id>,
    /// Measurement type id.
    pub measurement_type: Id,
    /// Description of the measurement type.
    pub type_name: String,
    /// Measurement group the row was written under.
    pub measurement_group: Id,
    /// Group instance the row belongs to.
    pub group_instance: Option<Id>,
    /// Trial, if any.
    pub trial: Option<Id>,
    /// Value type tag resolved through the registry.
    pub value_type: ValueType,
    /// Decoded value, `None` when the slot is empty.
    pub value: Option<Value>,
}

/// One reassembled measurement-group instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInstance {
    /// Instance id, equal to the id of the first measurement inserted.
    pub instance: Id,
    /// Time of the first member (lowest measurement type).
    pub time: DateTime<Utc>,
    /// Owning study.
    pub study: Id,
    /// Participant shared by the members.
    pub participant: Option<Id>,
    /// Measurement group the instance belongs to.
    pub measurement_group: Id,
    /// Trial shared by the members.
    pub trial: Option<Id>,
    /// Measurement type id to value.
    pub values: BTreeMap<Id, Option<Value>>,
}
impl GroupInstance {
    /// The value recorded for `measurement_type`, if the instance has one.
    pub fn value(&self, measurement_type: Id) -> Option<&Value> {
        self.values.get(&measurement_type).and_then(Option::as_ref)
    }
}

/// Metadata describing one measurement type of a study.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementTypeInfo {
    pub(crate) id: Id,
    pub(crate) description: String,
    pub(crate) value_type: ValueType,
    pub(crate) units: Option<String>,
}
impl MeasurementTypeInfo {
    /// Measurement type id.
    pub fn id(&self) -> Id {
        self.id
    }
    /// Human-readable description, also used as the type name on the read path.
    pub fn description(&self) -> &str {
        &self.description
    }
    /// Value type of every measurement of this type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
    /// Name of the units, if the type has any.
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }
}

/// A measurement group of a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementGroupMeta {
    pub(crate) id: Id,
    pub(crate) description: String,
}
impl MeasurementGroupMeta {
    /// Measurement group id.
    pub fn id(&self) -> Id {
        self.id
    }
    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A participant of a study with both of its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub(crate) id: Id,
    pub(crate) local_id: String,
}
impl Participant {
    /// Warehouse-wide participant id, as stored on measurements.
    pub fn id(&self) -> Id {
        self.id
    }
    /// Identifier local to the study (`participant.participantid`).
    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

/// One measurement type mapped into a measurement group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTypeMapping {
    pub(crate) measurement_group: Id,
    pub(crate) measurement_type: Id,
    pub(crate) name: String,
}
impl GroupTypeMapping {
    /// Measurement group id.
    pub fn measurement_group(&self) -> Id {
        self.measurement_group
    }
    /// Measurement type id.
    pub fn measurement_type(&self) -> Id {
        self.measurement_type
    }
    /// Name the type carries within the group.
    pub fn name(&self) -> &str {
        &self.name
    }
}
