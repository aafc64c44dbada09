//! Argument parsing and dispatch for the `warehouse` binary.

use std::{env, ffi::OsString, io::Write, path::PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::to_writer_pretty;
use tracing_subscriber::EnvFilter;
use warehouse_client::prelude::*;
use warehouse_core::parsers::parse_timestamp;

#[derive(Parser)]
#[command(name = "warehouse", version)]
struct Cli {
    /// Warehouse SQLite path (or env WAREHOUSE_CONNECTION)
    #[arg(long, env = "WAREHOUSE_CONNECTION", global = true)]
    db: Option<PathBuf>,

    /// JSON connection configuration; takes precedence over --db
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct FilterArgs {
    /// Study id
    #[arg(long)]
    study: Id,

    /// Participant id
    #[arg(long)]
    participant: Option<Id>,

    /// Trial id
    #[arg(long)]
    trial: Option<Id>,

    /// Earliest measurement time, e.g. 2020-03-01 or "2020-03-01 12:00"
    #[arg(long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,

    /// Latest measurement time
    #[arg(long, value_parser = parse_time)]
    end: Option<DateTime<Utc>>,

    /// Comma-separated participant ids; replaces --participant
    #[arg(long, value_delimiter = ',')]
    cohort: Vec<Id>,
}

impl FilterArgs {
    fn filter(&self) -> MeasurementFilter {
        let mut filter =
            MeasurementFilter::new(self.study).with_time_range(self.start, self.end);
        filter.participant = self.participant;
        filter.trial = self.trial;
        filter
    }
}

#[derive(Subcommand)]
enum Command {
    /// List measurements
    Measurements {
        #[command(flatten)]
        filter: FilterArgs,

        /// Measurement type id
        #[arg(long = "type")]
        measurement_type: Option<Id>,

        /// Measurement group id
        #[arg(long)]
        group: Option<Id>,

        /// Group instance id
        #[arg(long)]
        instance: Option<Id>,
    },
    /// Reassemble measurement group instances
    Instances {
        #[command(flatten)]
        filter: FilterArgs,

        /// Measurement group id
        #[arg(long)]
        group: Id,

        /// Value test <type>:<comparison>, e.g. "12:> 3"; repeatable
        #[arg(long = "where", value_parser = parse_value_test)]
        conditions: Vec<ValueTest>,
    },
    /// Aggregate the values of one measurement type
    Aggregate {
        #[command(flatten)]
        filter: FilterArgs,

        /// Measurement type id
        #[arg(long = "type")]
        measurement_type: Id,

        /// Measurement group id
        #[arg(long)]
        group: Option<Id>,

        /// SQL aggregate function, e.g. count, avg, max
        #[arg(long)]
        function: String,
    },
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}

fn parse_value_test(s: &str) -> Result<ValueTest, String> {
    s.parse::<ValueTest>().map_err(|e| e.to_string())
}

fn open(cli: &Cli) -> Result<Warehouse, Box<dyn std::error::Error>> {
    let config = match (&cli.config, &cli.db) {
        (Some(config), _) => WarehouseConfig::from_json_file(config)?,
        (None, Some(db)) => WarehouseConfig::new(db.to_string_lossy()),
        (None, None) => WarehouseConfig::from_env()?,
    };
    Ok(Warehouse::open_with_config(&config)?)
}

/// Execute the command-line interface, writing JSON to `out`.
pub fn run_with_writer<I, T, W>(args: I, out: W) -> Result<(), Box<dyn std::error::Error>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let cli = Cli::parse_from(args);
    let db = open(&cli)?;
    match &cli.command {
        Command::Measurements {
            filter,
            measurement_type,
            group,
            instance,
        } => {
            let mut selection = filter.filter();
            selection.measurement_type = *measurement_type;
            selection.measurement_group = *group;
            selection.group_instance = *instance;
            let measurements = if filter.cohort.is_empty() {
                db.get_measurements(&selection)?
            } else {
                db.get_measurements_for_cohort(&filter.cohort, &selection)?
            };
            to_writer_pretty(out, &measurements)?;
        }
        Command::Instances {
            filter,
            group,
            conditions,
        } => {
            let mut query = GroupInstanceQuery::new(filter.study, *group)
                .with_conditions(conditions.iter().cloned())
                .with_time_range(filter.start, filter.end);
            query.participant = filter.participant;
            query.trial = filter.trial;
            let instances = if filter.cohort.is_empty() {
                db.get_group_instances(&query)?
            } else {
                db.get_group_instances_for_cohort(&filter.cohort, &query)?
            };
            to_writer_pretty(out, &instances)?;
        }
        Command::Aggregate {
            filter,
            measurement_type,
            group,
            function,
        } => {
            let mut selection = filter.filter().with_measurement_type(*measurement_type);
            selection.measurement_group = *group;
            let value = db.aggregate_measurements(&selection, function)?;
            to_writer_pretty(out, &value)?;
        }
    }
    Ok(())
}

/// Execute the command-line interface with a custom argv iterator.
pub fn run_with_args<I, T>(args: I) -> Result<(), Box<dyn std::error::Error>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with_writer(args, std::io::stdout())?;
    println!();
    Ok(())
}

/// Installs logging from `RUST_LOG` (default `warn`) and runs with the process arguments.
pub fn cli() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    run_with_args(env::args_os())
}
