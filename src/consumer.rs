//! Ingestion consumer: the single reader of the handoff queue and the
//! single writer of the shared window.

use crate::metrics::PipelineMetrics;
use crate::sink::AlertSink;
use crate::threshold::ThresholdChecker;
use crate::types::transaction::Transaction;
use crate::window::WindowStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Applies the per-transaction checks and records timestamps for spike detection
pub struct TransactionConsumer {
    checker: ThresholdChecker,
    store: Arc<WindowStore>,
    sink: Arc<dyn AlertSink>,
    metrics: Arc<PipelineMetrics>,
}

impl TransactionConsumer {
    /// Create a new consumer writing into `store`
    pub fn new(
        checker: ThresholdChecker,
        store: Arc<WindowStore>,
        sink: Arc<dyn AlertSink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            checker,
            store,
            sink,
            metrics,
        }
    }

    /// Fully process one transaction: amount check, then record and trim
    pub fn process(&self, transaction: Transaction) {
        let start_time = Instant::now();

        if self.checker.check(&transaction, self.sink.as_ref()) {
            self.metrics.record_alert("high_amount");
            info!(
                transaction_id = %transaction.transaction_id,
                amount = transaction.amount,
                ceiling = self.checker.ceiling(),
                "High amount alert raised"
            );
        }

        let trimmed = self.store.record(transaction.timestamp, Utc::now());
        let processing_time = start_time.elapsed();
        self.metrics.record_transaction(processing_time);

        debug!(
            transaction_id = %transaction.transaction_id,
            trimmed,
            processing_time_us = processing_time.as_micros() as u64,
            "Transaction processed"
        );
    }

    /// Process queued transactions in FIFO order until the queue is closed
    /// and empty. Returns the number processed.
    pub async fn run(self, mut queue: tokio::sync::mpsc::Receiver<Transaction>) -> u64 {
        let mut processed = 0u64;

        while let Some(transaction) = queue.recv().await {
            self.process(transaction);
            processed += 1;
        }

        info!(processed, "Ingestion queue drained, consumer stopped");
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use crate::types::alert::Alert;
    use chrono::TimeDelta;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn consumer_with_channel(
        ceiling: f64,
        retention: Duration,
    ) -> (TransactionConsumer, Arc<WindowStore>, mpsc::Receiver<Alert>, Arc<PipelineMetrics>) {
        let store = Arc::new(WindowStore::new(retention));
        let (sink, alerts) = ChannelSink::with_capacity(64);
        let metrics = Arc::new(PipelineMetrics::new());
        let consumer = TransactionConsumer::new(
            ThresholdChecker::new(ceiling),
            store.clone(),
            Arc::new(sink),
            metrics.clone(),
        );
        (consumer, store, alerts, metrics)
    }

    #[test]
    fn test_process_alerts_and_records() {
        let (consumer, store, mut alerts, metrics) =
            consumer_with_channel(10_000.0, Duration::from_secs(3600));

        consumer.process(Transaction::new(12_000.0));
        consumer.process(Transaction::new(500.0));

        assert_eq!(store.size(), 2);
        assert_eq!(metrics.transactions_processed.load(Ordering::Relaxed), 2);

        match alerts.try_recv().unwrap() {
            Alert::HighAmount { transaction } => assert_eq!(transaction.amount, 12_000.0),
            other => panic!("unexpected alert {other:?}"),
        }
        assert!(alerts.try_recv().is_err());
    }

    #[test]
    fn test_process_trims_to_retention() {
        let (consumer, store, _alerts, _metrics) =
            consumer_with_channel(10_000.0, Duration::from_secs(60));
        let now = Utc::now();

        consumer.process(Transaction::at(1.0, now - TimeDelta::seconds(300)));
        consumer.process(Transaction::at(1.0, now));

        assert_eq!(store.size(), 1);
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_close() {
        let (consumer, store, _alerts, _metrics) =
            consumer_with_channel(10_000.0, Duration::from_secs(3600));
        let (tx, rx) = mpsc::channel(8);

        for amount in [1.0, 2.0, 3.0] {
            tx.send(Transaction::new(amount)).await.unwrap();
        }
        drop(tx);

        assert_eq!(consumer.run(rx).await, 3);
        assert_eq!(store.size(), 3);
    }
}
