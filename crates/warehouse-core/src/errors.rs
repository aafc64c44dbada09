//! Error types shared across the warehouse crates.

use thiserror::Error;

/// Errors raised while parsing a warehouse timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTimestampError {
    /// The input contained no digits at all.
    #[error("timestamp \"{0}\" has no digits")]
    NoDigits(String),
    /// The digits did not form a valid calendar date or time of day.
    #[error("invalid timestamp: {0}")]
    ChronoError(String),
}
