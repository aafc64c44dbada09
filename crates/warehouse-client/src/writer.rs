//! Insertion of measurement-group instances.
//!
//! An instance is written as one transaction: every member row is inserted,
//! the first row's generated id becomes the group-instance id of all of them,
//! and any failure rolls the whole instance back.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, warn};
use warehouse_core::{parsers::format_timestamp, Id, ValueType};

use crate::{
    data::Value,
    executor::{opt_id, QueryExecutor, SqlValue, TransactionalExecutor, WriteExecutor},
    registry::{validate, value_type_for, SlotValue},
    WarehouseError, WarehouseResult,
};

const INSERT_MEASUREMENT: &str = "INSERT INTO measurement \
     (time, study, trial, measurementgroup, groupinstance, measurementtype, \
      participant, source, valtype, valinteger, valreal) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const LINK_GROUP_INSTANCE: &str = "UPDATE measurement SET groupinstance = ? WHERE id = ?";

/// One member of a group instance: a measurement type, its raw value-type tag
/// and the value to store.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Measurement type of the member.
    pub measurement_type: Id,
    /// Raw tag; resolved and checked when the instance is inserted.
    pub value_type: i64,
    /// Value to store.
    pub value: Value,
}
impl Member {
    /// A member of a known value type.
    pub fn new(measurement_type: Id, value_type: ValueType, value: impl Into<Value>) -> Self {
        Self::with_tag(measurement_type, value_type.tag(), value)
    }
    /// A member carrying an unchecked tag, as read from an import file.
    pub fn with_tag(measurement_type: Id, value_type: i64, value: impl Into<Value>) -> Self {
        Self {
            measurement_type,
            value_type,
            value: value.into(),
        }
    }
}

/// Everything needed to write one measurement-group instance.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInstanceRequest {
    /// Study the instance belongs to.
    pub study: Id,
    /// Measurement group of the instance.
    pub measurement_group: Id,
    /// Written in order; the first member's id becomes the instance id.
    pub members: Vec<Member>,
    /// Defaults to the current time.
    pub time: Option<DateTime<Utc>>,
    /// Trial shared by every member.
    pub trial: Option<Id>,
    /// Participant shared by every member.
    pub participant: Option<Id>,
    /// Data source shared by every member.
    pub source: Option<Id>,
}

impl GroupInstanceRequest {
    /// An instance with no time, trial, participant or source set.
    pub fn new(study: Id, measurement_group: Id, members: Vec<Member>) -> Self {
        Self {
            study,
            measurement_group,
            members,
            time: None,
            trial: None,
            participant: None,
            source: None,
        }
    }
    /// Sets the time shared by every member.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
    /// Sets the trial.
    pub fn with_trial(mut self, trial: Id) -> Self {
        self.trial = Some(trial);
        self
    }
    /// Sets the participant.
    pub fn with_participant(mut self, participant: Id) -> Self {
        self.participant = Some(participant);
        self
    }
    /// Sets the data source.
    pub fn with_source(mut self, source: Id) -> Self {
        self.source = Some(source);
        self
    }

    fn failure(&self, cause: WarehouseError, member: Option<&Member>) -> InsertFailure {
        InsertFailure {
            cause,
            study: self.study,
            participant: self.participant,
            trial: self.trial,
            measurement_group: self.measurement_group,
            measurement_type: member.map(|m| m.measurement_type),
            value: member.map(|m| m.value.clone()),
            data_source: self.source,
        }
    }
}

/// A rejected or rolled-back instance together with the context needed to
/// report it. Nothing of the instance was persisted.
#[derive(Error, Debug)]
#[error(
    "failed to insert instance of measurement group {measurement_group} in study {study} \
     (participant {participant:?}, trial {trial:?}, source {data_source:?}, \
     measurement type {measurement_type:?}, value {value:?}): {cause}"
)]
pub struct InsertFailure {
    /// Why the instance was rejected.
    #[source]
    pub cause: WarehouseError,
    /// Study of the rejected instance.
    pub study: Id,
    /// Participant of the rejected instance.
    pub participant: Option<Id>,
    /// Trial of the rejected instance.
    pub trial: Option<Id>,
    /// Measurement group of the rejected instance.
    pub measurement_group: Id,
    /// Member being processed when the failure occurred, if any.
    pub measurement_type: Option<Id>,
    /// Value of that member.
    pub value: Option<Value>,
    /// Data source of the rejected instance.
    pub data_source: Option<Id>,
}

struct PreparedMember<'r> {
    member: &'r Member,
    value_type: ValueType,
    slot_value: SlotValue,
}

fn prepare_member(member: &Member) -> WarehouseResult<PreparedMember<'_>> {
    let value_type = value_type_for(member.value_type)?;
    let slot_value = validate(value_type, &member.value)?;
    Ok(PreparedMember {
        member,
        value_type,
        slot_value,
    })
}

fn prepare(request: &GroupInstanceRequest) -> Result<Vec<PreparedMember<'_>>, InsertFailure> {
    if request.members.is_empty() {
        return Err(request.failure(WarehouseError::EmptyGroupInstance, None));
    }
    request
        .members
        .iter()
        .map(|member| prepare_member(member).map_err(|e| request.failure(e, Some(member))))
        .collect()
}

fn insert_member<H: WriteExecutor>(
    handle: &H,
    request: &GroupInstanceRequest,
    time: &str,
    group_instance: Option<Id>,
    prepared: &PreparedMember<'_>,
) -> WarehouseResult<Id> {
    let params = [
        SqlValue::Text(time.to_string()),
        SqlValue::Integer(request.study),
        opt_id(request.trial),
        SqlValue::Integer(request.measurement_group),
        opt_id(group_instance),
        SqlValue::Integer(prepared.member.measurement_type),
        opt_id(request.participant),
        opt_id(request.source),
        SqlValue::Integer(prepared.value_type.tag()),
        prepared.slot_value.integer(),
        prepared.slot_value.real(),
    ];
    let id = handle
        .execute_write(INSERT_MEASUREMENT, &params)?
        .generated_id()
        .ok_or(WarehouseError::UnexpectedValue { column: "id" })?;
    if let Some((table, value)) = prepared.slot_value.secondary() {
        let sql = format!(
            "INSERT INTO {table} (measurement, {}, study) VALUES (?, ?, ?)",
            prepared.value_type.slot().column()
        );
        handle.execute_write(&sql, &[SqlValue::Integer(id), value, SqlValue::Integer(request.study)])?;
    }
    Ok(id)
}

// The first row is inserted without a group instance and linked to itself
// before any other member is written, all inside the open handle.
fn write_members<H: QueryExecutor + WriteExecutor>(
    handle: &H,
    request: &GroupInstanceRequest,
    members: &[PreparedMember<'_>],
) -> Result<Id, (usize, WarehouseError)> {
    let time = format_timestamp(&request.time.unwrap_or_else(Utc::now));
    let mut group_instance = None;
    for (index, prepared) in members.iter().enumerate() {
        let id = insert_member(handle, request, &time, group_instance, prepared)
            .map_err(|e| (index, e))?;
        if group_instance.is_none() {
            handle
                .execute_write(LINK_GROUP_INSTANCE, &[SqlValue::Integer(id), SqlValue::Integer(id)])
                .map_err(|e| (index, e))?;
            group_instance = Some(id);
        }
    }
    group_instance.ok_or((0, WarehouseError::EmptyGroupInstance))
}

/// Writes one measurement-group instance and returns its id.
///
/// Every member is validated before the store is touched. Given a
/// [`Connection`] the instance is committed in its own transaction; given an
/// open transaction it is written in a savepoint and the final commit is left
/// to the caller. On failure nothing of the instance remains in either case.
pub fn insert_group_instance<E: TransactionalExecutor>(
    executor: &mut E,
    request: &GroupInstanceRequest,
) -> Result<Id, InsertFailure> {
    let members = prepare(request).inspect_err(|failure| {
        warn!(error = %failure, "rejected measurement group instance");
    })?;
    let handle = executor
        .begin_transaction()
        .map_err(|e| request.failure(e, None))?;
    match write_members(&handle, request, &members) {
        Ok(instance) => {
            E::commit(handle).map_err(|e| request.failure(e, None))?;
            info!(
                instance,
                members = members.len(),
                study = request.study,
                measurement_group = request.measurement_group,
                nested = E::NESTED,
                "inserted measurement group instance"
            );
            Ok(instance)
        }
        Err((index, cause)) => {
            let failure = request.failure(cause, Some(members[index].member));
            if let Err(error) = E::rollback(handle) {
                warn!(%error, "rollback of measurement group instance failed");
            }
            warn!(error = %failure, "rolled back measurement group instance");
            Err(failure)
        }
    }
}

/// Writes a batch of instances inside one transaction, each in its own
/// savepoint. Failed instances are skipped and reported; the rest are
/// committed together.
pub fn import_group_instances(
    connection: &mut Connection,
    requests: &[GroupInstanceRequest],
) -> WarehouseResult<Vec<Result<Id, InsertFailure>>> {
    let mut transaction = connection.transaction()?;
    let outcomes: Vec<_> = requests
        .iter()
        .map(|request| insert_group_instance(&mut transaction, request))
        .collect();
    transaction.commit()?;
    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    info!(
        inserted = outcomes.len() - failed,
        failed, "imported measurement group instances"
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_name_the_offending_member() {
        let request = GroupInstanceRequest::new(
            1,
            2,
            vec![
                Member::new(10, ValueType::Integer, 5),
                Member::new(11, ValueType::Boolean, 3),
            ],
        )
        .with_participant(7);
        let Err(failure) = prepare(&request) else {
            panic!("boolean value 3 should be rejected");
        };
        assert!(matches!(failure.cause, WarehouseError::InvalidBooleanValue(3)));
        assert_eq!(failure.measurement_type, Some(11));
        assert_eq!(failure.value, Some(Value::Int(3)));
        assert_eq!(failure.participant, Some(7));
    }

    #[test]
    fn unknown_tags_and_empty_instances_are_rejected() {
        let request = GroupInstanceRequest::new(1, 2, vec![Member::with_tag(10, 11, 5)]);
        let Err(failure) = prepare(&request) else {
            panic!("tag 11 should be rejected");
        };
        assert!(matches!(failure.cause, WarehouseError::UnknownValueType(11)));

        let Err(failure) = prepare(&GroupInstanceRequest::new(1, 2, Vec::new())) else {
            panic!("an empty instance should be rejected");
        };
        assert!(matches!(failure.cause, WarehouseError::EmptyGroupInstance));
        assert_eq!(failure.measurement_type, None);
    }
}
