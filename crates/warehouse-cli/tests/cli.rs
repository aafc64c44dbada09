//! Integration tests for the warehouse command-line interface.

use std::path::PathBuf;

use rusqlite::Connection;
use warehouse_client::prelude::*;
use warehouse_cli::cli::run_with_writer;

fn seeded_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("warehouse-cli-{name}-{}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let connection = Connection::open(&path).expect("failed to create database");
    connection
        .execute_batch(include_str!("../../warehouse-client/tests/fixtures/schema.sql"))
        .expect("failed to create schema");
    connection
        .execute_batch(include_str!("../../warehouse-client/tests/fixtures/seed.sql"))
        .expect("failed to seed database");
    drop(connection);

    let db = Warehouse::open(&path).expect("failed to open database");
    for (participant, steps) in [(1, 5), (2, 2), (3, 8)] {
        let request = GroupInstanceRequest::new(
            1,
            1,
            vec![
                Member::new(1, ValueType::Integer, steps),
                Member::new(2, ValueType::Real, 70.0),
            ],
        )
        .with_participant(participant);
        db.insert_measurement_group(&request).expect("insert failed");
    }
    path
}

fn run(args: &[&str]) -> serde_json::Value {
    let mut out = Vec::new();
    run_with_writer(args.iter().copied(), &mut out).expect("command failed");
    serde_json::from_slice(&out).expect("output is not JSON")
}

#[test]
fn instances_subcommand_applies_value_tests() {
    let path = seeded_db("instances");
    let db = path.to_str().expect("temp path is not UTF-8");
    let output = run(&[
        "warehouse", "--db", db, "instances", "--study", "1", "--group", "1", "--where", "1:> 3",
    ]);
    let instances = output.as_array().expect("expected an array");
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0]["participant"], 1);
    assert_eq!(instances[1]["values"]["1"], 8);

    let output = run(&[
        "warehouse", "--db", db, "instances", "--study", "1", "--group", "1", "--cohort", "2,3",
    ]);
    assert_eq!(output.as_array().map(Vec::len), Some(2));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn measurements_and_aggregate_subcommands() {
    let path = seeded_db("measurements");
    let db = path.to_str().expect("temp path is not UTF-8");
    let output = run(&[
        "warehouse", "--db", db, "measurements", "--study", "1", "--type", "1",
    ]);
    let rows = output.as_array().expect("expected an array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["type_name"], "Steps");
    assert_eq!(rows[0]["value_type"], "Integer");

    let output = run(&[
        "warehouse", "--db", db, "aggregate", "--study", "1", "--type", "1", "--function", "count",
    ]);
    assert_eq!(output, 3);
    let _ = std::fs::remove_file(&path);
}
