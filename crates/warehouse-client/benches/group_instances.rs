//! Benchmarks for group instance insertion.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use rusqlite::Connection;
use warehouse_client::prelude::*;

const STEPS: Id = 1;
const WEIGHT: Id = 2;
const INSTANCES: i64 = 2_000;

fn open_seeded_db() -> Warehouse {
    let connection = Connection::open_in_memory().expect("failed to open database");
    connection
        .execute_batch(include_str!("../tests/fixtures/schema.sql"))
        .expect("failed to create schema");
    connection
        .execute_batch(include_str!("../tests/fixtures/seed.sql"))
        .expect("failed to seed database");
    let db = Warehouse::from_connection(connection);
    let requests: Vec<_> = (0..INSTANCES)
        .map(|i| {
            GroupInstanceRequest::new(
                1,
                1,
                vec![
                    Member::new(STEPS, ValueType::Integer, i),
                    Member::new(WEIGHT, ValueType::Real, 60.0 + (i % 40) as f64),
                ],
            )
            .with_participant(1 + i % 3)
        })
        .collect();
    db.import_measurement_groups(&requests)
        .expect("failed to import instances");
    db
}

fn bench_group_instances(c: &mut Criterion) {
    let db = open_seeded_db();
    let all = GroupInstanceQuery::new(1, 1);
    let filtered = GroupInstanceQuery::new(1, 1)
        .with_condition(value_test(STEPS).geq(INSTANCES / 2))
        .with_condition(value_test(WEIGHT).lt(80.0));

    let mut group = c.benchmark_group("get_group_instances");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("unfiltered", |b| {
        b.iter(|| {
            let data = db.get_group_instances(&all).expect("fetch failed");
            std::hint::black_box(&data);
        })
    });
    group.bench_function("two_conditions", |b| {
        b.iter(|| {
            let data = db.get_group_instances(&filtered).expect("fetch failed");
            std::hint::black_box(&data);
        })
    });
    group.bench_function("cohort", |b| {
        b.iter(|| {
            let data = db
                .get_group_instances_for_cohort(&[1, 3], &filtered)
                .expect("fetch failed");
            std::hint::black_box(&data);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_group_instances);
criterion_main!(benches);
