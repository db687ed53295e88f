//! Transaction-rate spike detection.
//!
//! Each cycle compares the event rate over a short compare window against
//! the baseline rate over the long spike window. Both counts come from the
//! same locked view of the shared [`WindowStore`]; the short count is a
//! read-time filter, the store itself is never trimmed to the short horizon.

use crate::config::DetectionConfig;
use crate::metrics::PipelineMetrics;
use crate::rate::{RateSample, WindowName};
use crate::shutdown::Shutdown;
use crate::sink::AlertSink;
use crate::types::alert::Alert;
use crate::window::{SlidingWindow, WindowStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Outcome of one detection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvaluation {
    pub baseline: RateSample,
    pub recent: RateSample,
    pub spike: bool,
}

impl SpikeEvaluation {
    /// The `RateSpike` alert for this cycle, if it detected a spike
    pub fn to_alert(&self) -> Option<Alert> {
        self.spike.then(|| {
            Alert::rate_spike(self.recent.rate, self.baseline.rate, self.recent.computed_at)
        })
    }
}

/// Compares recent against baseline transaction rate
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    multiplier: f64,
    spike_window: Duration,
    compare_window: Duration,
}

impl SpikeDetector {
    /// Create a new detector
    pub fn new(multiplier: f64, spike_window: Duration, compare_window: Duration) -> Self {
        Self {
            multiplier,
            spike_window,
            compare_window,
        }
    }

    /// Create a detector from the detection settings
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.spike_threshold_multiplier,
            config.spike_window(),
            config.spike_compare_window(),
        )
    }

    /// Baseline horizon
    pub fn spike_window(&self) -> Duration {
        self.spike_window
    }

    /// Short recent horizon
    pub fn compare_window(&self) -> Duration {
        self.compare_window
    }

    /// Strict comparison: a recent rate exactly at the threshold is not a spike
    pub fn is_spike(&self, recent_rate: f64, baseline_rate: f64) -> bool {
        recent_rate > self.multiplier * baseline_rate
    }

    /// Compute both rates from one window view
    pub fn evaluate(&self, window: &SlidingWindow, now: DateTime<Utc>) -> SpikeEvaluation {
        let baseline_count = window.count_within(self.spike_window, now);
        let recent_count = window.count_within(self.compare_window, now);

        let baseline =
            RateSample::compute(WindowName::Baseline, baseline_count, self.spike_window, now);
        let recent =
            RateSample::compute(WindowName::Compare, recent_count, self.compare_window, now);

        SpikeEvaluation {
            spike: self.is_spike(recent.rate, baseline.rate),
            baseline,
            recent,
        }
    }

    /// Evaluate the shared store under its lock.
    ///
    /// The lock is released before the result is returned, so alert
    /// delivery never happens while the window is held.
    pub fn evaluate_store(&self, store: &WindowStore, now: DateTime<Utc>) -> SpikeEvaluation {
        store.read(|window| self.evaluate(window, now))
    }

    /// Run detection cycles every `interval` until shutdown.
    ///
    /// The first cycle runs immediately. Shutdown interrupts the wait between
    /// cycles; a cycle already computing finishes against its own snapshot.
    pub async fn run(
        self,
        store: Arc<WindowStore>,
        sink: Arc<dyn AlertSink>,
        metrics: Arc<PipelineMetrics>,
        interval: Duration,
        mut shutdown: Shutdown,
    ) {
        info!(
            interval_ms = interval.as_millis() as u64,
            spike_window_ms = self.spike_window.as_millis() as u64,
            compare_window_ms = self.compare_window.as_millis() as u64,
            multiplier = self.multiplier,
            "Spike detector started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    let evaluation = self.evaluate_store(&store, Utc::now());
                    metrics.record_detection_cycle(&evaluation.baseline, &evaluation.recent);

                    debug!(
                        baseline_rate = evaluation.baseline.rate,
                        recent_rate = evaluation.recent.rate,
                        spike = evaluation.spike,
                        "Detection cycle complete"
                    );

                    if let Some(alert) = evaluation.to_alert() {
                        metrics.record_alert(alert.kind());
                        sink.notify(alert);
                    }
                }
            }
        }

        info!("Spike detector stopped");
    }
}
