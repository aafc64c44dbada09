#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use warehouse_client::prelude::*;

pub const STUDY: Id = 1;
pub const VITALS: Id = 1;
pub const DIARY: Id = 2;
pub const STEPS: Id = 1;
pub const WEIGHT: Id = 2;
pub const MOOD: Id = 3;
pub const WOKE: Id = 4;
pub const SMOKER: Id = 5;

pub fn open_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("failed to open in-memory database");
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .expect("failed to enable foreign keys");
    connection
        .execute_batch(include_str!("../fixtures/schema.sql"))
        .expect("failed to create schema");
    connection
        .execute_batch(include_str!("../fixtures/seed.sql"))
        .expect("failed to seed database");
    connection
}

pub fn open_db() -> Warehouse {
    Warehouse::from_connection(open_connection())
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, day, 9, 30, 0).unwrap()
}

/// A vitals instance for `participant` recorded on `day`.
pub fn vitals(participant: Id, day: u32, steps: i64, weight: f64) -> GroupInstanceRequest {
    GroupInstanceRequest::new(
        STUDY,
        VITALS,
        vec![
            Member::new(STEPS, ValueType::Integer, steps),
            Member::new(WEIGHT, ValueType::Real, weight),
        ],
    )
    .with_participant(participant)
    .with_time(at(day))
}

pub fn measurement_count(db: &Warehouse) -> usize {
    db.get_measurements(&MeasurementFilter::new(STUDY))
        .expect("failed to count measurements")
        .len()
}
