//! Typed access to the measurements data warehouse.
//!
//! The heart of the crate is the measurement-group instance protocol: the
//! all-or-nothing insert of a group instance ([`writer`]) and the query that
//! reassembles stored rows into instances, optionally dropping every instance
//! with a member that fails a value test ([`reader`]).

pub mod cond;
pub mod config;
pub mod data;
pub mod database;
pub mod executor;
pub mod filter;
pub mod lookup;
pub mod models;
pub mod reader;
pub mod registry;
pub mod writer;

pub use config::WarehouseConfig;
pub use data::Value;
pub use database::Warehouse;
pub use warehouse_core::{Id, Slot, ValueType};

use thiserror::Error;
use warehouse_core::errors::ParseTimestampError;

/// Convenience alias for results returned from warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Errors that can occur while reading from or writing to the warehouse.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// Connectivity or constraint failure reported by the store.
    #[error("{0}")]
    StoreError(#[from] rusqlite::Error),
    /// A value-type tag outside the fixed enumeration.
    #[error("unknown value type tag: {0}")]
    UnknownValueType(i64),
    /// A boolean-typed value other than 0 or 1.
    #[error("invalid boolean value {0} (expected 0 or 1)")]
    InvalidBooleanValue(i64),
    /// A value whose kind cannot be stored in the slot of its value type.
    #[error("value {value} cannot be stored as {value_type}")]
    ValueMismatch {
        /// Value type the value was checked against.
        value_type: ValueType,
        /// Rendered offending value.
        value: String,
    },
    /// A cohort query was given no participants.
    #[error("cohort must contain at least one participant")]
    EmptyCohort,
    /// A group instance insert was given no members.
    #[error("measurement group instance must contain at least one member")]
    EmptyGroupInstance,
    /// Zero or several rows matched where exactly one was expected.
    #[error("expected exactly one {entity} matching {key}, found {matches}")]
    NotFound {
        /// Kind of entity looked up.
        entity: &'static str,
        /// Rendered lookup key.
        key: String,
        /// Number of rows that matched.
        matches: usize,
    },
    /// The operation needs the filter to name a measurement type.
    #[error("a measurement type is required for this query")]
    MissingMeasurementType,
    /// The aggregation name is not a bare SQL identifier.
    #[error("invalid aggregation function: {0:?}")]
    InvalidAggregation(String),
    /// A textual comparison could not be parsed.
    #[error("{0}")]
    ParseComparisonError(#[from] cond::ParseComparisonError),
    /// A stored or supplied timestamp could not be parsed.
    #[error("{0}")]
    ParseTimestampError(#[from] ParseTimestampError),
    /// A result column held a value of the wrong storage class.
    #[error("unexpected value in column {column}")]
    UnexpectedValue {
        /// Name of the offending column.
        column: &'static str,
    },
    /// Invalid or missing connection configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),
    /// Failure reading a configuration file.
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    /// Failure decoding a configuration file.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),
}

/// Re-exports for the most common types.
pub mod prelude {
    pub use crate::{
        cond::{value_test, Comparison, Operator, ValueTest},
        config::WarehouseConfig,
        data::Value,
        database::Warehouse,
        filter::MeasurementFilter,
        models::{GroupInstance, GroupTypeMapping, Measurement, MeasurementTypeInfo, Participant},
        reader::GroupInstanceQuery,
        writer::{GroupInstanceRequest, InsertFailure, Member},
        WarehouseError, WarehouseResult,
    };
    pub use warehouse_core::{Id, ValueType};
}
