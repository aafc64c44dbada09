//! Measurement queries and reassembly of measurement-group instances.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::debug;
use warehouse_core::{parsers::parse_timestamp, Id, ValueType};

use crate::{
    cond::{build_failed_conditions_filter, build_value_test, Comparison, ResolvedValueTest, ValueTest},
    data::Value,
    executor::{get_id, get_opt_id, get_opt_real, get_opt_text, get_text, get_time, QueryExecutor, SqlRow, SqlValue},
    filter::{build_cohort_filter, build_filter, MeasurementFilter, Predicate},
    lookup::measurement_type_info,
    models::{GroupInstance, Measurement},
    registry::{decode, value_type_for},
    WarehouseError, WarehouseResult,
};

const MEASUREMENT_SELECT: &str = "SELECT measurement.id, measurement.time, measurement.study, \
     measurement.participant, measurement.measurementtype, measurementtype.description, \
     measurement.measurementgroup, measurement.groupinstance, measurement.trial, \
     measurement.valtype, measurement.valinteger, measurement.valreal, \
     textvalue.textval, datetimevalue.datetimeval";

const MEASUREMENT_FROM: &str = " FROM measurement \
     JOIN measurementtype ON measurementtype.id = measurement.measurementtype \
     LEFT JOIN textvalue ON textvalue.measurement = measurement.id \
     LEFT JOIN datetimevalue ON datetimevalue.measurement = measurement.id";

fn decode_measurement(row: &SqlRow) -> WarehouseResult<Measurement> {
    let value_type = value_type_for(get_id(row, 9, "valtype")?)?;
    let datetime = get_opt_text(row, 13, "datetimeval")?
        .map(|text| parse_timestamp(&text))
        .transpose()?;
    let value = decode(
        value_type,
        get_opt_id(row, 10, "valinteger")?,
        get_opt_real(row, 11, "valreal")?,
        get_opt_text(row, 12, "textval")?,
        datetime,
    );
    Ok(Measurement {
        id: get_id(row, 0, "id")?,
        time: get_time(row, 1, "time")?,
        study: get_id(row, 2, "study")?,
        participant: get_opt_id(row, 3, "participant")?,
        measurement_type: get_id(row, 4, "measurementtype")?,
        type_name: get_text(row, 5, "description")?,
        measurement_group: get_id(row, 6, "measurementgroup")?,
        group_instance: get_opt_id(row, 7, "groupinstance")?,
        trial: get_opt_id(row, 8, "trial")?,
        value_type,
        value,
    })
}

fn fetch_measurements<Q: QueryExecutor>(
    executor: &Q,
    predicate: &Predicate,
    order_by: &str,
) -> WarehouseResult<Vec<Measurement>> {
    let sql = format!(
        "{MEASUREMENT_SELECT}{MEASUREMENT_FROM}{} ORDER BY {order_by}",
        predicate.where_clause()
    );
    executor
        .execute_query(&sql, predicate.params())?
        .iter()
        .map(decode_measurement)
        .collect()
}

/// Every measurement matching `filter`, ordered by id.
pub fn get_measurements<Q: QueryExecutor>(
    executor: &Q,
    filter: &MeasurementFilter,
) -> WarehouseResult<Vec<Measurement>> {
    fetch_measurements(executor, &build_filter(filter), "measurement.id")
}

/// Measurements of the filter's measurement type whose value satisfies
/// `comparison`.
pub fn get_measurements_with_value_test<Q: QueryExecutor>(
    executor: &Q,
    filter: &MeasurementFilter,
    comparison: &Comparison,
) -> WarehouseResult<Vec<Measurement>> {
    let measurement_type = filter
        .measurement_type
        .ok_or(WarehouseError::MissingMeasurementType)?;
    let info = measurement_type_info(executor, filter.study, measurement_type)?;
    let predicate = build_filter(filter).and(build_value_test(info.value_type(), comparison)?);
    fetch_measurements(executor, &predicate, "measurement.id")
}

/// Measurements matching `filter` recorded for any of `participants`.
pub fn get_measurements_for_cohort<Q: QueryExecutor>(
    executor: &Q,
    participants: &[Id],
    filter: &MeasurementFilter,
) -> WarehouseResult<Vec<Measurement>> {
    fetch_measurements(
        executor,
        &build_cohort_filter(participants, filter)?,
        "measurement.id",
    )
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Applies the SQL aggregate `aggregation` (e.g. `avg`, `count`) to the values
/// of the filter's measurement type. Returns `None` when the aggregate is NULL.
///
/// `max` and `min` decode like the read path (booleans come back as
/// [`Value::Bool`]); every other aggregate returns the raw slot value.
pub fn aggregate_measurements<Q: QueryExecutor>(
    executor: &Q,
    filter: &MeasurementFilter,
    aggregation: &str,
) -> WarehouseResult<Option<Value>> {
    if !is_identifier(aggregation) {
        return Err(WarehouseError::InvalidAggregation(aggregation.to_string()));
    }
    let measurement_type = filter
        .measurement_type
        .ok_or(WarehouseError::MissingMeasurementType)?;
    let value_type = measurement_type_info(executor, filter.study, measurement_type)?.value_type();
    let predicate = build_filter(filter);
    let sql = format!(
        "SELECT {aggregation}({}){MEASUREMENT_FROM}{}",
        value_type.slot().qualified_column(),
        predicate.where_clause()
    );
    let value = executor
        .execute_query(&sql, predicate.params())?
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next());
    let value = value.and_then(|value| Value::from_sql_value(value, value_type.is_datetime_slot()));
    Ok(match value {
        Some(Value::Int(v)) if value_type == ValueType::Boolean && preserves_values(aggregation) => {
            Some(Value::Bool(v != 0))
        }
        value => value,
    })
}

// Aggregates whose result is one of the aggregated values.
fn preserves_values(aggregation: &str) -> bool {
    ["max", "min"]
        .iter()
        .any(|name| aggregation.eq_ignore_ascii_case(name))
}

/// The distinct participants appearing in `measurements`, sorted.
pub fn participants_in_result(measurements: &[Measurement]) -> Vec<Id> {
    measurements
        .iter()
        .filter_map(|m| m.participant)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Selection of measurement-group instances.
///
/// An instance is returned only if every one of its members satisfies every
/// condition that applies to the member's measurement type.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInstanceQuery {
    /// Study the instances belong to.
    pub study: Id,
    /// Measurement group to reassemble.
    pub measurement_group: Id,
    /// Value tests every member must pass.
    pub conditions: Vec<ValueTest>,
    /// Ignored by the cohort variant.
    pub participant: Option<Id>,
    /// Trial id.
    pub trial: Option<Id>,
    /// Inclusive lower bound on member time.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on member time.
    pub end_time: Option<DateTime<Utc>>,
}

impl GroupInstanceQuery {
    /// Every instance of `measurement_group` in `study`.
    pub fn new(study: Id, measurement_group: Id) -> Self {
        Self {
            study,
            measurement_group,
            conditions: Vec::new(),
            participant: None,
            trial: None,
            start_time: None,
            end_time: None,
        }
    }
    /// Adds one value test.
    pub fn with_condition(mut self, condition: ValueTest) -> Self {
        self.conditions.push(condition);
        self
    }
    /// Adds several value tests.
    pub fn with_conditions(mut self, conditions: impl IntoIterator<Item = ValueTest>) -> Self {
        self.conditions.extend(conditions);
        self
    }
    /// Restricts to one participant.
    pub fn with_participant(mut self, participant: Id) -> Self {
        self.participant = Some(participant);
        self
    }
    /// Restricts to one trial.
    pub fn with_trial(mut self, trial: Id) -> Self {
        self.trial = Some(trial);
        self
    }
    /// Restricts member time to `start..=end`; either end may be open.
    pub fn with_time_range(
        mut self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    fn filter(&self) -> MeasurementFilter {
        MeasurementFilter {
            study: self.study,
            participant: self.participant,
            measurement_group: Some(self.measurement_group),
            trial: self.trial,
            start_time: self.start_time,
            end_time: self.end_time,
            ..Default::default()
        }
    }
}

fn resolve_tests<Q: QueryExecutor>(
    executor: &Q,
    study: Id,
    conditions: &[ValueTest],
) -> WarehouseResult<Vec<ResolvedValueTest>> {
    conditions
        .iter()
        .map(|condition| {
            let info = measurement_type_info(executor, study, condition.measurement_type)?;
            Ok(ResolvedValueTest {
                measurement_type: condition.measurement_type,
                value_type: info.value_type(),
                comparison: condition.comparison.clone(),
            })
        })
        .collect()
}

fn fetch_group_instances<Q: QueryExecutor>(
    executor: &Q,
    query: &GroupInstanceQuery,
    base: Predicate,
) -> WarehouseResult<Vec<GroupInstance>> {
    let tests = resolve_tests(executor, query.study, &query.conditions)?;
    let mut predicate = base.clone();
    if !tests.is_empty() {
        // instances with at least one member failing its test
        let mut failing = base.and(build_failed_conditions_filter(&tests)?);
        failing.push(
            "measurement.groupinstance IS NOT NULL",
            std::iter::empty::<SqlValue>(),
        );
        predicate.push(
            format!(
                "measurement.groupinstance NOT IN (SELECT measurement.groupinstance{MEASUREMENT_FROM}{})",
                failing.where_clause()
            ),
            failing.params().to_vec(),
        );
    }
    let measurements = fetch_measurements(
        executor,
        &predicate,
        "measurement.groupinstance, measurement.measurementtype, measurement.id",
    )?;
    let instances = form_group_instances(measurements);
    debug!(
        study = query.study,
        measurement_group = query.measurement_group,
        conditions = tests.len(),
        instances = instances.len(),
        "reassembled measurement group instances"
    );
    Ok(instances)
}

/// Instances of the query's measurement group, ordered by instance id.
pub fn get_group_instances<Q: QueryExecutor>(
    executor: &Q,
    query: &GroupInstanceQuery,
) -> WarehouseResult<Vec<GroupInstance>> {
    fetch_group_instances(executor, query, build_filter(&query.filter()))
}

/// Like [`get_group_instances`], restricted to an explicit cohort of
/// participants instead of the query's single participant.
pub fn get_group_instances_for_cohort<Q: QueryExecutor>(
    executor: &Q,
    participants: &[Id],
    query: &GroupInstanceQuery,
) -> WarehouseResult<Vec<GroupInstance>> {
    let base = build_cohort_filter(participants, &query.filter())?;
    fetch_group_instances(executor, query, base)
}

/// Folds measurements ordered by group instance into instances. Rows without
/// a group instance are skipped.
pub fn form_group_instances(measurements: Vec<Measurement>) -> Vec<GroupInstance> {
    let mut instances = Vec::new();
    for (key, members) in &measurements.into_iter().chunk_by(|m| m.group_instance) {
        let Some(instance) = key else {
            continue;
        };
        let mut members = members.peekable();
        let Some(first) = members.peek() else {
            continue;
        };
        let mut group = GroupInstance {
            instance,
            time: first.time,
            study: first.study,
            participant: first.participant,
            measurement_group: first.measurement_group,
            trial: first.trial,
            values: BTreeMap::new(),
        };
        for member in members {
            group.values.insert(member.measurement_type, member.value);
        }
        instances.push(group);
    }
    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn measurement(id: Id, group_instance: Option<Id>, measurement_type: Id, value: Value) -> Measurement {
        Measurement {
            id,
            time: Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap(),
            study: 1,
            participant: Some(4),
            measurement_type,
            type_name: format!("type {measurement_type}"),
            measurement_group: 2,
            group_instance,
            trial: None,
            value_type: ValueType::Integer,
            value: Some(value),
        }
    }

    #[test]
    fn consecutive_rows_form_one_instance() {
        let rows = vec![
            measurement(1, Some(1), 10, Value::Int(5)),
            measurement(2, Some(1), 11, Value::Int(6)),
            measurement(3, Some(3), 10, Value::Int(7)),
            measurement(9, None, 10, Value::Int(8)),
        ];
        let instances = form_group_instances(rows);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance, 1);
        assert_eq!(instances[0].value(10), Some(&Value::Int(5)));
        assert_eq!(instances[0].value(11), Some(&Value::Int(6)));
        assert_eq!(instances[1].instance, 3);
        assert_eq!(instances[1].values.len(), 1);
    }

    #[test]
    fn participants_are_unique_and_sorted() {
        let mut rows = vec![
            measurement(1, Some(1), 10, Value::Int(5)),
            measurement(2, Some(1), 11, Value::Int(6)),
        ];
        rows[0].participant = Some(9);
        rows.push(Measurement {
            participant: None,
            ..measurement(3, Some(3), 10, Value::Int(1))
        });
        assert_eq!(participants_in_result(&rows), vec![4, 9]);
    }

    #[test]
    fn aggregation_names_must_be_identifiers() {
        assert!(is_identifier("avg"));
        assert!(is_identifier("group_concat"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("count(*); --"));
    }

    #[test]
    fn only_max_and_min_preserve_values() {
        assert!(preserves_values("max"));
        assert!(preserves_values("MIN"));
        assert!(!preserves_values("avg"));
        assert!(!preserves_values("count"));
    }
}
