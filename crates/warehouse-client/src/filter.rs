//! Composition of `WHERE` clauses from optional equality and range filters.

use chrono::{DateTime, Utc};
use warehouse_core::{parsers::format_timestamp, Id};

use crate::{executor::SqlValue, WarehouseError, WarehouseResult};

/// Optional filters shared by the measurement queries. `None` leaves a field
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementFilter {
    /// Study every selected measurement belongs to.
    pub study: Id,
    /// Participant id.
    pub participant: Option<Id>,
    /// Measurement type id.
    pub measurement_type: Option<Id>,
    /// Measurement group id.
    pub measurement_group: Option<Id>,
    /// Group instance id.
    pub group_instance: Option<Id>,
    /// Trial id.
    pub trial: Option<Id>,
    /// Inclusive lower bound on `measurement.time`.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `measurement.time`.
    pub end_time: Option<DateTime<Utc>>,
}

impl MeasurementFilter {
    /// A filter matching every measurement of `study`.
    pub fn new(study: Id) -> Self {
        Self {
            study,
            ..Default::default()
        }
    }
    /// Restricts to one participant.
    pub fn with_participant(mut self, participant: Id) -> Self {
        self.participant = Some(participant);
        self
    }
    /// Restricts to one measurement type.
    pub fn with_measurement_type(mut self, measurement_type: Id) -> Self {
        self.measurement_type = Some(measurement_type);
        self
    }
    /// Restricts to one measurement group.
    pub fn with_measurement_group(mut self, measurement_group: Id) -> Self {
        self.measurement_group = Some(measurement_group);
        self
    }
    /// Restricts to one group instance.
    pub fn with_group_instance(mut self, group_instance: Id) -> Self {
        self.group_instance = Some(group_instance);
        self
    }
    /// Restricts to one trial.
    pub fn with_trial(mut self, trial: Id) -> Self {
        self.trial = Some(trial);
        self
    }
    /// Sets the inclusive lower time bound.
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }
    /// Sets the inclusive upper time bound.
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }
    /// Restricts `measurement.time` to `start..=end`; either end may be open.
    pub fn with_time_range(
        mut self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }
}

/// A rendered SQL fragment with its bound parameters in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub(crate) sql: String,
    pub(crate) params: Vec<SqlValue>,
}
impl Fragment {
    pub(crate) fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
    /// SQL text with `?` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }
    /// Bound values in placeholder order.
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

/// A conjunction of clauses, rendered as a `WHERE` clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl Predicate {
    /// True when no clause has been added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `" WHERE a AND b ..."`, or the empty string when there are no clauses.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bound values, matching the placeholders of [`Predicate::where_clause`].
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Appends one clause and its parameters.
    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    /// Appends a fragment as one parenthesised clause.
    pub fn and(mut self, fragment: Fragment) -> Self {
        self.push(format!("({})", fragment.sql), fragment.params);
        self
    }

    fn push_eq(&mut self, column: &str, value: Option<Id>) {
        if let Some(value) = value {
            self.push(format!("measurement.{column} = ?"), [SqlValue::Integer(value)]);
        }
    }

    fn push_time(&mut self, op: &str, value: Option<&DateTime<Utc>>) {
        if let Some(value) = value {
            self.push(
                format!("measurement.time {op} ?"),
                [SqlValue::Text(format_timestamp(value))],
            );
        }
    }
}

fn push_common(predicate: &mut Predicate, filter: &MeasurementFilter, with_participant: bool) {
    predicate.push_eq("study", Some(filter.study));
    if with_participant {
        predicate.push_eq("participant", filter.participant);
    }
    predicate.push_eq("measurementtype", filter.measurement_type);
    predicate.push_eq("measurementgroup", filter.measurement_group);
    predicate.push_eq("groupinstance", filter.group_instance);
    predicate.push_eq("trial", filter.trial);
    predicate.push_time(">=", filter.start_time.as_ref());
    predicate.push_time("<=", filter.end_time.as_ref());
}

/// Builds the predicate for `filter`, skipping every unset field.
pub fn build_filter(filter: &MeasurementFilter) -> Predicate {
    let mut predicate = Predicate::default();
    push_common(&mut predicate, filter, true);
    predicate
}

/// Builds the predicate for a cohort: `measurement.participant IN (…)` first,
/// followed by the other fields of `filter` (its single participant is ignored).
pub fn build_cohort_filter(
    participants: &[Id],
    filter: &MeasurementFilter,
) -> WarehouseResult<Predicate> {
    if participants.is_empty() {
        return Err(WarehouseError::EmptyCohort);
    }
    let placeholders = vec!["?"; participants.len()].join(", ");
    let mut predicate = Predicate::default();
    predicate.push(
        format!("measurement.participant IN ({placeholders})"),
        participants.iter().map(|p| SqlValue::Integer(*p)),
    );
    push_common(&mut predicate, filter, false);
    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unset_fields_are_omitted() {
        let predicate = build_filter(&MeasurementFilter::new(2));
        assert_eq!(predicate.where_clause(), " WHERE measurement.study = ?");
        assert_eq!(predicate.params(), &[SqlValue::Integer(2)]);
    }

    #[test]
    fn clauses_follow_the_fixed_field_order() {
        let start = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        let filter = MeasurementFilter::new(2)
            .with_trial(7)
            .with_participant(5)
            .with_start_time(start)
            .with_measurement_group(3);
        let predicate = build_filter(&filter);
        assert_eq!(
            predicate.where_clause(),
            " WHERE measurement.study = ? AND measurement.participant = ? \
             AND measurement.measurementgroup = ? AND measurement.trial = ? \
             AND measurement.time >= ?"
        );
        assert_eq!(
            predicate.params(),
            &[
                SqlValue::Integer(2),
                SqlValue::Integer(5),
                SqlValue::Integer(3),
                SqlValue::Integer(7),
                SqlValue::Text("2020-03-01 00:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn cohort_filter_leads_with_participant_list() {
        let filter = MeasurementFilter::new(1).with_participant(99).with_trial(4);
        let predicate = build_cohort_filter(&[3, 1, 2], &filter).unwrap();
        assert_eq!(
            predicate.where_clause(),
            " WHERE measurement.participant IN (?, ?, ?) AND measurement.study = ? \
             AND measurement.trial = ?"
        );
        assert_eq!(predicate.params().len(), 5);
        assert!(matches!(
            build_cohort_filter(&[], &filter),
            Err(WarehouseError::EmptyCohort)
        ));
    }

    #[test]
    fn empty_predicate_renders_nothing() {
        let predicate = Predicate::default();
        assert!(predicate.is_empty());
        assert_eq!(predicate.where_clause(), "");
        let extended = predicate.and(Fragment::new("x = ?", vec![SqlValue::Integer(1)]));
        assert_eq!(extended.where_clause(), " WHERE (x = ?)");
    }
}
