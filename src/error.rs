//! Error types for the transaction alert pipeline

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors.
///
/// These are the only fatal errors in the pipeline: a configuration that
/// would produce meaningless rates is refused before any task is spawned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative amount (got {value})")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("spike threshold multiplier must be greater than 1 (got {0})")]
    MultiplierTooSmall(f64),

    #[error("{0} must be a positive duration")]
    ZeroDuration(&'static str),

    #[error("spike compare window ({compare:?}) must be shorter than the spike window ({window:?})")]
    CompareWindowTooLong { compare: Duration, window: Duration },

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("source delay range is empty: min {min_ms}ms > max {max_ms}ms")]
    InvalidDelayRange { min_ms: u64, max_ms: u64 },
}

/// Reasons an input line is rejected as a transaction
#[derive(Error, Debug)]
pub enum MalformedTransaction {
    #[error("unparseable transaction: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transaction amount must be finite and non-negative (got {0})")]
    InvalidAmount(f64),

    #[error("transaction timestamp {timestamp} is ahead of the local clock ({now})")]
    FutureTimestamp {
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}
