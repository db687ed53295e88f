//! Performance metrics and statistics tracking for the alert pipeline.

use crate::rate::RateSample;
use crate::shutdown::Shutdown;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline activity
pub struct PipelineMetrics {
    /// Transactions fully processed by the ingestion consumer
    pub transactions_processed: AtomicU64,
    /// Total alerts handed to the sink
    pub alerts_generated: AtomicU64,
    /// Spike detection cycles run
    pub detection_cycles: AtomicU64,
    /// Transactions pulled from the source after shutdown began
    pub transactions_discarded: AtomicU64,
    /// Input events rejected as malformed
    pub malformed_events: AtomicU64,
    /// Alerts by kind
    alerts_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Ingestion processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Most recent (baseline, compare) rates
    last_rates: RwLock<Option<(f64, f64)>>,
    /// Start time for throughput calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            detection_cycles: AtomicU64::new(0),
            transactions_discarded: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            alerts_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            last_rates: RwLock::new(None),
            start_time: Instant::now(),
        }
    }

    /// Record a processed transaction
    pub fn record_transaction(&self, processing_time: Duration) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record an alert of the given kind
    pub fn record_alert(&self, kind: &'static str) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.alerts_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    /// Record a completed detection cycle and the rates it saw
    pub fn record_detection_cycle(&self, baseline: &RateSample, recent: &RateSample) {
        self.detection_cycles.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut rates) = self.last_rates.write() {
            *rates = Some((baseline.rate, recent.rate));
        }
    }

    pub fn record_discarded(&self) {
        self.transactions_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get alerts by kind
    pub fn get_alerts_by_kind(&self) -> HashMap<&'static str, u64> {
        self.alerts_by_kind
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the most recent (baseline, compare) rates, if any cycle ran
    pub fn get_last_rates(&self) -> Option<(f64, f64)> {
        *self
            .last_rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let alerts_by_kind = self.get_alerts_by_kind();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          TRANSACTION ALERT PIPELINE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Processed: {:>8}  │  Throughput: {:>6.2} tx/s ║",
            tx_count,
            self.get_throughput()
        );
        info!(
            "║ Alerts Generated:       {:>8}  │  Detection Cycles: {:>6} ║",
            alert_count,
            self.detection_cycles.load(Ordering::Relaxed)
        );
        info!(
            "║ Discarded on Shutdown:  {:>8}  │  Malformed Events: {:>6} ║",
            self.transactions_discarded.load(Ordering::Relaxed),
            self.malformed_events.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        if let Some((baseline, recent)) = self.get_last_rates() {
            info!(
                "║ Last Rates (tx/s): baseline={:>8.4}  recent={:>8.4}         ║",
                baseline, recent
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Alerts by Kind:                                              ║");
        for (kind, count) in &alerts_by_kind {
            let pct = if alert_count > 0 {
                (*count as f64 / alert_count as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:12}: {:>6} ({:>5.1}%)                              ║", kind, count, pct);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter, stopped by the pipeline shutdown signal
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    /// Create a new reporter printing every `interval_secs`
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Print a summary every interval until shutdown
    pub async fn start(self, mut shutdown: Shutdown) {
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = interval.tick() => self.metrics.print_summary(),
            }
        }
    }
}
