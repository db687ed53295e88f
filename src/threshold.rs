//! Per-transaction amount ceiling check

use crate::sink::AlertSink;
use crate::types::alert::Alert;
use crate::types::transaction::Transaction;

/// Flags transactions whose amount is strictly above a fixed ceiling
#[derive(Debug, Clone)]
pub struct ThresholdChecker {
    ceiling: f64,
}

impl ThresholdChecker {
    /// Create a new checker for the given ceiling
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Configured amount ceiling
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// True iff `transaction.amount > ceiling`
    pub fn exceeds(&self, transaction: &Transaction) -> bool {
        transaction.amount > self.ceiling
    }

    /// Check a transaction and emit a `HighAmount` alert when it breaches the ceiling.
    ///
    /// Returns whether an alert was emitted.
    pub fn check(&self, transaction: &Transaction, sink: &dyn AlertSink) -> bool {
        if !self.exceeds(transaction) {
            return false;
        }
        sink.notify(Alert::high_amount(transaction.clone()));
        true
    }
}
