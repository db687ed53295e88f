//! Producer stage: moves transactions from a source into the handoff queue

use crate::metrics::PipelineMetrics;
use crate::shutdown::Shutdown;
use crate::types::transaction::Transaction;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Feeds a transaction source into the bounded ingestion queue.
///
/// A full queue applies backpressure to the source. Shutdown stops the
/// producer between emissions, or while it waits for queue space; a
/// transaction caught in that wait is discarded and counted.
pub struct TransactionProducer<S> {
    source: S,
    queue: mpsc::Sender<Transaction>,
    metrics: Arc<PipelineMetrics>,
}

impl<S> TransactionProducer<S>
where
    S: Stream<Item = Transaction> + Unpin,
{
    /// Create a new producer over `source`
    pub fn new(source: S, queue: mpsc::Sender<Transaction>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            source,
            queue,
            metrics,
        }
    }

    /// Run until the source ends, the queue closes, or shutdown begins.
    ///
    /// Returns the number of transactions handed to the queue. The queue
    /// sender is dropped on return, which lets the consumer drain and exit.
    pub async fn run(mut self, mut shutdown: Shutdown) -> u64 {
        let mut emitted = 0u64;

        loop {
            let transaction = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown requested, transaction source stopped");
                    break;
                }
                next = self.source.next() => match next {
                    Some(transaction) => transaction,
                    None => {
                        info!("Transaction source ended");
                        break;
                    }
                },
            };

            let transaction_id = transaction.transaction_id.clone();
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    self.metrics.record_discarded();
                    debug!(
                        transaction_id = %transaction_id,
                        "Discarded transaction received during shutdown"
                    );
                    break;
                }
                sent = self.queue.send(transaction) => {
                    if sent.is_err() {
                        warn!("Ingestion queue closed, stopping producer");
                        break;
                    }
                    emitted += 1;
                }
            }
        }

        info!(emitted, "Producer stopped");
        emitted
    }
}
