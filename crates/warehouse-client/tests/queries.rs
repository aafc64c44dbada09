//! Integration tests for warehouse queries.

mod common;

use common::*;
use warehouse_client::prelude::*;

fn seed_vitals(db: &Warehouse) {
    for (participant, day, steps, weight) in [(1, 1, 4000, 70.5), (1, 2, 6000, 70.0), (2, 1, 1500, 82.0)] {
        db.insert_measurement_group(&vitals(participant, day, steps, weight))
            .expect("insert failed");
    }
}

#[test]
fn measurements_follow_the_filter() -> WarehouseResult<()> {
    let db = open_db();
    seed_vitals(&db);

    let all = db.get_measurements(&MeasurementFilter::new(STUDY))?;
    assert_eq!(all.len(), 6);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let steps = db.get_measurements(
        &MeasurementFilter::new(STUDY)
            .with_participant(1)
            .with_measurement_type(STEPS),
    )?;
    assert_eq!(
        steps.iter().map(|m| m.value.clone()).collect::<Vec<_>>(),
        vec![Some(Value::Int(4000)), Some(Value::Int(6000))]
    );

    let day_two = db.get_measurements(
        &MeasurementFilter::new(STUDY).with_time_range(Some(at(2)), Some(at(2))),
    )?;
    assert_eq!(day_two.len(), 2);
    assert!(day_two.iter().all(|m| m.time == at(2)));

    assert!(db
        .get_measurements(&MeasurementFilter::new(STUDY).with_trial(1))?
        .is_empty());
    Ok(())
}

#[test]
fn value_tests_on_single_measurement_types() -> WarehouseResult<()> {
    let db = open_db();
    seed_vitals(&db);
    let filter = MeasurementFilter::new(STUDY).with_measurement_type(WEIGHT);
    let heavy = db.get_measurements_with_value_test(&filter, &"> 75".parse()?)?;
    assert_eq!(heavy.len(), 1);
    assert_eq!(heavy[0].participant, Some(2));
    assert_eq!(heavy[0].value, Some(Value::Real(82.0)));

    assert!(matches!(
        db.get_measurements_with_value_test(&MeasurementFilter::new(STUDY), &"> 75".parse()?),
        Err(WarehouseError::MissingMeasurementType)
    ));
    assert!(matches!(
        db.get_measurements_with_value_test(&filter, &"= 'heavy'".parse()?),
        Err(WarehouseError::ValueMismatch { .. })
    ));
    Ok(())
}

#[test]
fn cohort_measurements() -> WarehouseResult<()> {
    let db = open_db();
    seed_vitals(&db);
    db.insert_measurement_group(&vitals(3, 3, 9000, 90.0))
        .expect("insert failed");

    let rows = db.get_measurements_for_cohort(&[2, 3], &MeasurementFilter::new(STUDY))?;
    assert_eq!(rows.len(), 4);
    assert_eq!(Warehouse::participants_in_result(&rows), vec![2, 3]);
    assert!(matches!(
        db.get_measurements_for_cohort(&[], &MeasurementFilter::new(STUDY)),
        Err(WarehouseError::EmptyCohort)
    ));
    Ok(())
}

#[test]
fn aggregates_over_one_measurement_type() -> WarehouseResult<()> {
    let db = open_db();
    seed_vitals(&db);
    let steps = MeasurementFilter::new(STUDY).with_measurement_type(STEPS);
    assert_eq!(db.aggregate_measurements(&steps, "count")?, Some(Value::Int(3)));
    assert_eq!(db.aggregate_measurements(&steps, "max")?, Some(Value::Int(6000)));

    let weight = MeasurementFilter::new(STUDY)
        .with_measurement_type(WEIGHT)
        .with_participant(1);
    assert_eq!(db.aggregate_measurements(&weight, "avg")?, Some(Value::Real(70.25)));

    let nobody = MeasurementFilter::new(STUDY)
        .with_measurement_type(WEIGHT)
        .with_participant(3);
    assert_eq!(db.aggregate_measurements(&nobody, "sum")?, None);

    assert!(matches!(
        db.aggregate_measurements(&steps, "count(*) FROM study --"),
        Err(WarehouseError::InvalidAggregation(_))
    ));
    assert!(matches!(
        db.aggregate_measurements(&MeasurementFilter::new(STUDY), "count"),
        Err(WarehouseError::MissingMeasurementType)
    ));
    Ok(())
}

#[test]
fn label_lookups_require_exactly_one_match() -> WarehouseResult<()> {
    let db = open_db();
    assert_eq!(db.study_by_label("S1")?, STUDY);
    assert!(matches!(
        db.study_by_label("twin"),
        Err(WarehouseError::NotFound { matches: 2, .. })
    ));
    assert!(matches!(
        db.study_by_label("missing"),
        Err(WarehouseError::NotFound { matches: 0, .. })
    ));
    assert_eq!(db.measurement_group_by_label(STUDY, "Diary")?, DIARY);
    assert!(matches!(
        db.measurement_group_by_label(STUDY, "Survey"),
        Err(WarehouseError::NotFound { matches: 2, .. })
    ));
    assert_eq!(db.participant_by_local_id(STUDY, "P-003")?, 3);
    Ok(())
}

#[test]
fn measurement_group_metadata() -> WarehouseResult<()> {
    let db = open_db();
    let groups = db.measurement_groups(STUDY)?;
    assert_eq!(groups.len(), 4);
    assert_eq!(groups[1].description(), "Diary");

    assert_eq!(db.type_ids_in_measurement_group(STUDY, DIARY)?, vec![MOOD, WOKE, SMOKER]);
    assert_eq!(db.types_in_measurement_group(STUDY, VITALS)?, vec!["steps", "weight"]);
    assert_eq!(db.num_types_in_measurement_group(STUDY, DIARY)?, 3);

    let info = db.measurement_type_info(STUDY, WEIGHT)?;
    assert_eq!(info.description(), "Weight");
    assert_eq!(info.value_type(), ValueType::Real);
    assert_eq!(info.units(), Some("kg"));
    assert!(matches!(
        db.measurement_type_info(STUDY, 99),
        Err(WarehouseError::NotFound { .. })
    ));

    assert_eq!(db.count_group_instances(STUDY, VITALS)?, 0);
    seed_vitals(&db);
    assert_eq!(db.count_group_instances(STUDY, VITALS)?, 3);
    assert_eq!(db.group_instance_ids(STUDY, VITALS)?.len(), 3);
    Ok(())
}

#[test]
fn participants_and_group_mappings() -> WarehouseResult<()> {
    let db = open_db();
    assert_eq!(db.participant_local_id(STUDY, 2)?, "P-002");
    assert!(matches!(
        db.participant_local_id(STUDY, 404),
        Err(WarehouseError::NotFound { matches: 0, .. })
    ));

    let participants = db.participants(STUDY)?;
    assert_eq!(
        participants
            .iter()
            .map(|p| (p.id(), p.local_id()))
            .collect::<Vec<_>>(),
        vec![(1, "P-001"), (2, "P-002"), (3, "P-003")]
    );
    assert!(db.participants(2)?.is_empty());

    let mappings = db.measurement_groups_and_types(STUDY)?;
    assert_eq!(
        mappings
            .iter()
            .map(|m| (m.measurement_group(), m.measurement_type(), m.name()))
            .collect::<Vec<_>>(),
        vec![
            (VITALS, STEPS, "steps"),
            (VITALS, WEIGHT, "weight"),
            (DIARY, MOOD, "mood"),
            (DIARY, WOKE, "woke"),
            (DIARY, SMOKER, "smoker"),
        ]
    );
    Ok(())
}

#[test]
fn boolean_extremes_decode_as_booleans() -> WarehouseResult<()> {
    let db = open_db();
    for smoker in [false, true, false] {
        let request = GroupInstanceRequest::new(
            STUDY,
            DIARY,
            vec![Member::new(SMOKER, ValueType::Boolean, smoker)],
        );
        db.insert_measurement_group(&request).expect("insert failed");
    }
    let smokers = MeasurementFilter::new(STUDY).with_measurement_type(SMOKER);
    assert_eq!(db.aggregate_measurements(&smokers, "max")?, Some(Value::Bool(true)));
    assert_eq!(db.aggregate_measurements(&smokers, "min")?, Some(Value::Bool(false)));
    assert_eq!(db.aggregate_measurements(&smokers, "sum")?, Some(Value::Int(1)));
    assert_eq!(db.aggregate_measurements(&smokers, "count")?, Some(Value::Int(3)));
    Ok(())
}
