//! Transaction sources feeding the pipeline.
//!
//! A source is any `Stream<Item = Transaction>`; the stream ending is how
//! the pipeline learns the source has terminated.

use crate::config::SourceConfig;
use crate::error::MalformedTransaction;
use crate::metrics::PipelineMetrics;
use crate::types::transaction::Transaction;
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

/// Random transaction generator used in place of a real feed
pub struct TransactionGenerator {
    rng: StdRng,
    max_amount: f64,
    min_delay_ms: u64,
    max_delay_ms: u64,
    transaction_counter: u64,
}

impl TransactionGenerator {
    /// Create a new generator seeded from entropy
    pub fn new(config: &SourceConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic generator for tests and reproducible runs
    pub fn with_seed(config: &SourceConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &SourceConfig, rng: StdRng) -> Self {
        Self {
            rng,
            max_amount: config.max_amount,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            transaction_counter: 0,
        }
    }

    /// Generate a transaction stamped now, amount uniform in `[0, max_amount)`
    pub fn next_transaction(&mut self) -> Transaction {
        self.transaction_counter += 1;
        Transaction::new(self.rng.gen_range(0.0..self.max_amount))
    }

    /// Random pause before the next emission
    pub fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.min_delay_ms..=self.max_delay_ms))
    }

    /// Number of transactions generated so far
    pub fn generated(&self) -> u64 {
        self.transaction_counter
    }

    /// Endless stream: emit, then sleep a random delay before the next one
    pub fn into_stream(self) -> BoxStream<'static, Transaction> {
        stream::unfold((self, None), |(mut generator, pending_delay)| async move {
            if let Some(delay) = pending_delay {
                tokio::time::sleep(delay).await;
            }
            let transaction = generator.next_transaction();
            let delay = generator.next_delay();
            Some((transaction, (generator, Some(delay))))
        })
        .boxed()
    }
}

/// How far ahead of the local clock an input timestamp may be
pub const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Parse one JSON line into a transaction, rejecting impossible amounts
/// and timestamps from the future
pub fn parse_transaction(line: &str) -> Result<Transaction, MalformedTransaction> {
    parse_transaction_at(line, Utc::now())
}

/// Parse one JSON line, judging its timestamp against `now`
pub fn parse_transaction_at(
    line: &str,
    now: DateTime<Utc>,
) -> Result<Transaction, MalformedTransaction> {
    let transaction: Transaction = serde_json::from_str(line)?;
    if !transaction.amount.is_finite() || transaction.amount < 0.0 {
        return Err(MalformedTransaction::InvalidAmount(transaction.amount));
    }
    if transaction.timestamp - now > TimeDelta::seconds(MAX_FUTURE_SKEW_SECS) {
        return Err(MalformedTransaction::FutureTimestamp {
            timestamp: transaction.timestamp,
            now,
        });
    }
    Ok(transaction)
}

/// Stream of transactions read as newline-delimited JSON.
///
/// Malformed lines, including ones that are not valid UTF-8, are logged,
/// counted and skipped. The stream ends at end of input or on a read error.
pub fn json_lines<R>(reader: R, metrics: Arc<PipelineMetrics>) -> BoxStream<'static, Transaction>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold((reader, metrics), |(mut reader, metrics)| async move {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    info!("Transaction input reached end of stream");
                    return None;
                }
                Ok(_) => {
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line.trim(),
                        Err(e) => {
                            metrics.record_malformed();
                            warn!(error = %e, "Rejected transaction line that is not valid UTF-8");
                            continue;
                        }
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match parse_transaction(line) {
                        Ok(transaction) => return Some((transaction, (reader, metrics))),
                        Err(e) => {
                            metrics.record_malformed();
                            warn!(error = %e, "Rejected malformed transaction");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to read transaction input");
                    return None;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn fast_config() -> SourceConfig {
        SourceConfig {
            max_amount: 11_000.0,
            min_delay_ms: 1,
            max_delay_ms: 3,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_generator_respects_bounds() {
        let config = SourceConfig::default();
        let mut generator = TransactionGenerator::with_seed(&config, 7);

        for _ in 0..1000 {
            let tx = generator.next_transaction();
            assert!(tx.amount >= 0.0 && tx.amount < config.max_amount);

            let delay = generator.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(5_000));
        }
        assert_eq!(generator.generated(), 1000);
    }

    #[tokio::test]
    async fn test_generator_stream_emits_in_time_order() {
        let generator = TransactionGenerator::with_seed(&fast_config(), 42);
        let transactions: Vec<Transaction> = generator.into_stream().take(5).collect().await;

        assert_eq!(transactions.len(), 5);
        assert!(transactions
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_parse_transaction_rejects_bad_input() {
        assert!(parse_transaction(r#"{"amount": 10.5}"#).is_ok());
        assert!(matches!(
            parse_transaction("not json"),
            Err(MalformedTransaction::Json(_))
        ));
        assert!(matches!(
            parse_transaction(r#"{"transaction_id": "tx_1"}"#),
            Err(MalformedTransaction::Json(_))
        ));
        assert!(matches!(
            parse_transaction(r#"{"amount": -5.0}"#),
            Err(MalformedTransaction::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_parse_transaction_rejects_future_timestamps() {
        let now = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(matches!(
            parse_transaction_at(r#"{"amount": 1.0, "timestamp": "2999-01-01T00:00:00Z"}"#, now),
            Err(MalformedTransaction::FutureTimestamp { .. })
        ));
        // Small clock skew is tolerated
        let within_skew =
            parse_transaction_at(r#"{"amount": 1.0, "timestamp": "2024-06-01T12:00:30Z"}"#, now)
                .unwrap();
        assert_eq!(within_skew.timestamp, now + TimeDelta::seconds(30));
        assert!(parse_transaction_at(
            r#"{"amount": 1.0, "timestamp": "2024-06-01T11:00:00Z"}"#,
            now
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_json_lines_counts_future_dated_lines() {
        let input = concat!(
            "{\"transaction_id\": \"a\", \"amount\": 1.0}\n",
            "{\"transaction_id\": \"b\", \"amount\": 1.0, \"timestamp\": \"2999-01-01T00:00:00Z\"}\n",
            "{\"transaction_id\": \"c\", \"amount\": 1.0}\n",
        );
        let metrics = Arc::new(PipelineMetrics::new());

        let transactions: Vec<Transaction> =
            json_lines(input.as_bytes(), metrics.clone()).collect().await;

        let ids: Vec<&str> = transactions
            .iter()
            .map(|tx| tx.transaction_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(metrics.malformed_events.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_json_lines_skips_invalid_utf8_and_continues() {
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"amount\": 1.0}\n");
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(b"{\"amount\": 2.0}\n");
        input.extend_from_slice(b"{\"amount\": 3.0}");
        let metrics = Arc::new(PipelineMetrics::new());

        let transactions: Vec<Transaction> =
            json_lines(std::io::Cursor::new(input), metrics.clone())
                .collect()
                .await;

        let amounts: Vec<f64> = transactions.iter().map(|tx| tx.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
        assert_eq!(metrics.malformed_events.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_json_lines_skips_malformed_and_ends_at_eof() {
        let input = concat!(
            "{\"transaction_id\": \"a\", \"amount\": 100.0}\n",
            "\n",
            "garbage\n",
            "{\"transaction_id\": \"b\", \"amount\": -1}\n",
            "{\"transaction_id\": \"c\", \"amount\": 12000.0}\n",
        );
        let metrics = Arc::new(PipelineMetrics::new());

        let transactions: Vec<Transaction> =
            json_lines(input.as_bytes(), metrics.clone()).collect().await;

        let ids: Vec<&str> = transactions
            .iter()
            .map(|tx| tx.transaction_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(metrics.malformed_events.load(Ordering::Relaxed), 2);
    }
}
