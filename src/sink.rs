//! Alert sinks: where alerts leave the pipeline

use crate::types::alert::Alert;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Receiver of pipeline alerts.
///
/// `notify` is fire-and-forget and is called from the ingestion and
/// detection tasks, so implementations must not block. Delivery failures
/// are the sink's concern; the pipeline carries on as if delivery succeeded.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Sink that writes every alert as a structured `warn!` event
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    /// Create a new log sink
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for LogSink {
    fn notify(&self, alert: Alert) {
        match alert {
            Alert::HighAmount { transaction } => {
                warn!(
                    transaction_id = %transaction.transaction_id,
                    amount = format!("{:.2}", transaction.amount),
                    timestamp = %transaction.timestamp,
                    "High single transaction amount"
                );
            }
            Alert::RateSpike {
                short_rate,
                baseline_rate,
                detected_at,
            } => {
                warn!(
                    short_rate = format!("{:.2}", short_rate),
                    baseline_rate = format!("{:.2}", baseline_rate),
                    detected_at = %detected_at,
                    "Sudden spike in transaction rate"
                );
            }
        }
    }
}

/// Sink that forwards alerts into a bounded channel.
///
/// Uses `try_send`, so a full or closed channel drops the alert (with a
/// log line) instead of stalling the pipeline.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Alert>,
}

impl ChannelSink {
    /// Create a new sink over an existing sender
    pub fn new(sender: mpsc::Sender<Alert>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end of its channel
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

impl AlertSink for ChannelSink {
    fn notify(&self, alert: Alert) {
        match self.sender.try_send(alert) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                warn!(kind = alert.kind(), "Alert channel full, dropping alert");
            }
            Err(TrySendError::Closed(alert)) => {
                debug!(kind = alert.kind(), "Alert channel closed, dropping alert");
            }
        }
    }
}
