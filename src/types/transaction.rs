//! Transaction events flowing through the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single financial transaction.
///
/// Transactions are consumed by value: once the source hands one to the
/// pipeline nothing mutates it, and alerts carry their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    #[serde(default = "new_transaction_id")]
    pub transaction_id: String,

    /// Transaction amount
    pub amount: f64,

    /// Time the transaction was emitted by its source
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Transaction {
    /// Create a transaction stamped with the current time
    pub fn new(amount: f64) -> Self {
        Self::at(amount, Utc::now())
    }

    /// Create a transaction with an explicit timestamp
    pub fn at(amount: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            transaction_id: new_transaction_id(),
            amount,
            timestamp,
        }
    }
}
