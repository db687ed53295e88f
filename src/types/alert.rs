//! Alert data structures

use crate::types::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification raised by the pipeline.
///
/// Alerts are handed to an [`AlertSink`](crate::sink::AlertSink) by value
/// and never flow back into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// A single transaction exceeded the amount ceiling
    HighAmount { transaction: Transaction },

    /// The recent transaction rate exceeded the baseline by more than the multiplier
    RateSpike {
        /// Events per second over the compare window
        short_rate: f64,
        /// Events per second over the spike window
        baseline_rate: f64,
        detected_at: DateTime<Utc>,
    },
}

impl Alert {
    /// Create a new high amount alert
    pub fn high_amount(transaction: Transaction) -> Self {
        Alert::HighAmount { transaction }
    }

    /// Create a new rate spike alert
    pub fn rate_spike(short_rate: f64, baseline_rate: f64, detected_at: DateTime<Utc>) -> Self {
        Alert::RateSpike {
            short_rate,
            baseline_rate,
            detected_at,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::HighAmount { .. } => "high_amount",
            Alert::RateSpike { .. } => "rate_spike",
        }
    }
}
