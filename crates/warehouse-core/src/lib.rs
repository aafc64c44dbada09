//! Core types shared by the measurements data warehouse crates.

pub mod errors;
pub mod parsers;
pub mod value_type;

pub use value_type::{Slot, ValueType};

/// Primary integer identifier type used for every warehouse table.
pub type Id = i64;
