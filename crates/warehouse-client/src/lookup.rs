//! Read-only lookups of warehouse metadata. Nothing is cached; every call
//! re-queries the store.

use std::fmt::Display;

use warehouse_core::Id;

use crate::{
    executor::{get_id, get_opt_text, get_text, QueryExecutor, SqlValue},
    models::{GroupTypeMapping, MeasurementGroupMeta, MeasurementTypeInfo, Participant},
    registry::value_type_for,
    WarehouseError, WarehouseResult,
};

fn exactly_one<T>(mut rows: Vec<T>, entity: &'static str, key: impl Display) -> WarehouseResult<T> {
    match rows.len() {
        1 => rows.pop().ok_or(WarehouseError::NotFound {
            entity,
            key: key.to_string(),
            matches: 0,
        }),
        matches => Err(WarehouseError::NotFound {
            entity,
            key: key.to_string(),
            matches,
        }),
    }
}

fn query_ids<Q: QueryExecutor>(executor: &Q, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<Id>> {
    executor
        .execute_query(sql, params)?
        .iter()
        .map(|row| get_id(row, 0, "id"))
        .collect()
}

fn query_count<Q: QueryExecutor>(executor: &Q, sql: &str, params: &[SqlValue]) -> WarehouseResult<usize> {
    let count = query_ids(executor, sql, params)?
        .into_iter()
        .next()
        .unwrap_or(0);
    usize::try_from(count).map_err(|_| WarehouseError::UnexpectedValue { column: "count" })
}

/// Description, value type and units of a measurement type.
pub fn measurement_type_info<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_type: Id,
) -> WarehouseResult<MeasurementTypeInfo> {
    let rows = executor.execute_query(
        "SELECT measurementtype.id, measurementtype.description, measurementtype.valtype, units.name \
         FROM measurementtype LEFT JOIN units ON units.id = measurementtype.units \
         WHERE measurementtype.study = ? AND measurementtype.id = ?",
        &[SqlValue::Integer(study), SqlValue::Integer(measurement_type)],
    )?;
    let row = exactly_one(rows, "measurement type", measurement_type)?;
    Ok(MeasurementTypeInfo {
        id: get_id(&row, 0, "id")?,
        description: get_text(&row, 1, "description")?,
        value_type: value_type_for(get_id(&row, 2, "valtype")?)?,
        units: get_opt_text(&row, 3, "name")?,
    })
}

/// Resolves a study from its external label.
pub fn study_by_label<Q: QueryExecutor>(executor: &Q, label: &str) -> WarehouseResult<Id> {
    let ids = query_ids(
        executor,
        "SELECT id FROM study WHERE studyid = ?",
        &[SqlValue::Text(label.to_string())],
    )?;
    exactly_one(ids, "study", label)
}

/// Resolves a measurement group of `study` from its description.
pub fn measurement_group_by_label<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    label: &str,
) -> WarehouseResult<Id> {
    let ids = query_ids(
        executor,
        "SELECT id FROM measurementgroup WHERE study = ? AND description = ?",
        &[SqlValue::Integer(study), SqlValue::Text(label.to_string())],
    )?;
    exactly_one(ids, "measurement group", label)
}

/// Maps a participant id local to `study` onto its warehouse id.
pub fn participant_by_local_id<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    local_id: &str,
) -> WarehouseResult<Id> {
    let ids = query_ids(
        executor,
        "SELECT id FROM participant WHERE study = ? AND participantid = ?",
        &[SqlValue::Integer(study), SqlValue::Text(local_id.to_string())],
    )?;
    exactly_one(ids, "participant", local_id)
}

/// The study-local identifier of participant `participant`.
pub fn participant_local_id<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    participant: Id,
) -> WarehouseResult<String> {
    let rows = executor.execute_query(
        "SELECT participantid FROM participant WHERE study = ? AND id = ?",
        &[SqlValue::Integer(study), SqlValue::Integer(participant)],
    )?;
    let row = exactly_one(rows, "participant", participant)?;
    get_text(&row, 0, "participantid")
}

/// Every participant of `study`, ordered by id.
pub fn participants<Q: QueryExecutor>(executor: &Q, study: Id) -> WarehouseResult<Vec<Participant>> {
    executor
        .execute_query(
            "SELECT id, participantid FROM participant WHERE study = ? ORDER BY id",
            &[SqlValue::Integer(study)],
        )?
        .iter()
        .map(|row| {
            Ok(Participant {
                id: get_id(row, 0, "id")?,
                local_id: get_text(row, 1, "participantid")?,
            })
        })
        .collect()
}

/// Measurement groups of `study`, ordered by id.
pub fn measurement_groups<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
) -> WarehouseResult<Vec<MeasurementGroupMeta>> {
    executor
        .execute_query(
            "SELECT id, description FROM measurementgroup WHERE study = ? ORDER BY id",
            &[SqlValue::Integer(study)],
        )?
        .iter()
        .map(|row| {
            Ok(MeasurementGroupMeta {
                id: get_id(row, 0, "id")?,
                description: get_text(row, 1, "description")?,
            })
        })
        .collect()
}

/// Measurement types belonging to a group, in ascending id order.
pub fn type_ids_in_measurement_group<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_group: Id,
) -> WarehouseResult<Vec<Id>> {
    query_ids(
        executor,
        "SELECT measurementtype FROM measurementtypetogroup \
         WHERE study = ? AND measurementgroup = ? ORDER BY measurementtype",
        &[SqlValue::Integer(study), SqlValue::Integer(measurement_group)],
    )
}

/// Names the measurement types carry within a group, in type id order.
pub fn types_in_measurement_group<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_group: Id,
) -> WarehouseResult<Vec<String>> {
    executor
        .execute_query(
            "SELECT name FROM measurementtypetogroup \
             WHERE study = ? AND measurementgroup = ? ORDER BY measurementtype",
            &[SqlValue::Integer(study), SqlValue::Integer(measurement_group)],
        )?
        .iter()
        .map(|row| get_text(row, 0, "name"))
        .collect()
}

/// Number of measurement types mapped into a group.
pub fn num_types_in_measurement_group<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_group: Id,
) -> WarehouseResult<usize> {
    query_count(
        executor,
        "SELECT COUNT(*) FROM measurementtypetogroup WHERE study = ? AND measurementgroup = ?",
        &[SqlValue::Integer(study), SqlValue::Integer(measurement_group)],
    )
}

/// Every group-to-type mapping of `study`, ordered by group then type.
pub fn measurement_groups_and_types<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
) -> WarehouseResult<Vec<GroupTypeMapping>> {
    executor
        .execute_query(
            "SELECT measurementgroup, measurementtype, name FROM measurementtypetogroup \
             WHERE study = ? ORDER BY measurementgroup, measurementtype",
            &[SqlValue::Integer(study)],
        )?
        .iter()
        .map(|row| {
            Ok(GroupTypeMapping {
                measurement_group: get_id(row, 0, "measurementgroup")?,
                measurement_type: get_id(row, 1, "measurementtype")?,
                name: get_text(row, 2, "name")?,
            })
        })
        .collect()
}

/// Ids of every stored instance of a group, ascending.
pub fn group_instance_ids<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_group: Id,
) -> WarehouseResult<Vec<Id>> {
    query_ids(
        executor,
        "SELECT DISTINCT groupinstance FROM measurement \
         WHERE study = ? AND measurementgroup = ? AND groupinstance IS NOT NULL \
         ORDER BY groupinstance",
        &[SqlValue::Integer(study), SqlValue::Integer(measurement_group)],
    )
}

/// Number of stored instances of a group.
pub fn count_group_instances<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    measurement_group: Id,
) -> WarehouseResult<usize> {
    query_count(
        executor,
        "SELECT COUNT(DISTINCT groupinstance) FROM measurement \
         WHERE study = ? AND measurementgroup = ?",
        &[SqlValue::Integer(study), SqlValue::Integer(measurement_group)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_reports_the_match_count() {
        assert_eq!(exactly_one(vec![7], "study", "S1").unwrap(), 7);
        assert!(matches!(
            exactly_one(Vec::<Id>::new(), "study", "S1"),
            Err(WarehouseError::NotFound { matches: 0, .. })
        ));
        assert!(matches!(
            exactly_one(vec![1, 2], "study", "S1"),
            Err(WarehouseError::NotFound { matches: 2, .. })
        ));
    }
}
