//! Type definitions for the transaction alert pipeline

pub mod alert;
pub mod transaction;

pub use alert::Alert;
pub use transaction::Transaction;
