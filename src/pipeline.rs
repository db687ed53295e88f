//! Pipeline coordinator.
//!
//! Wires source -> producer -> queue -> consumer -> window, runs the spike
//! detector beside them, and owns shutdown:
//!
//! - `PipelineHandle::shutdown` stops the producer. The consumer drains what
//!   is already queued, then exits.
//! - The detector and metrics reporter stop at their next wait point.
//! - If the source ends on its own, the consumer triggers the same shutdown
//!   once it has drained, so the detector does not outlive its input.

use crate::config::AppConfig;
use crate::consumer::TransactionConsumer;
use crate::detector::SpikeDetector;
use crate::error::ConfigError;
use crate::metrics::{MetricsReporter, PipelineMetrics};
use crate::producer::TransactionProducer;
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::sink::AlertSink;
use crate::threshold::ThresholdChecker;
use crate::types::transaction::Transaction;
use crate::window::WindowStore;
use anyhow::{Context, Result};
use futures::Stream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Lifecycle state of a started pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    ShuttingDown,
}

/// Totals reported once every pipeline task has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Transactions the producer handed to the queue
    pub emitted: u64,
    /// Transactions the consumer fully processed
    pub processed: u64,
    /// Transactions dropped because they arrived after shutdown began
    pub discarded: u64,
}

/// A validated, not yet started pipeline
pub struct Pipeline {
    checker: ThresholdChecker,
    detector: SpikeDetector,
    reporting_interval: Duration,
    queue_capacity: usize,
    metrics_interval_secs: u64,
    sink: Arc<dyn AlertSink>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Build a pipeline, refusing invalid configuration
    pub fn new(config: &AppConfig, sink: Arc<dyn AlertSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let detection = &config.detection;

        Ok(Self {
            checker: ThresholdChecker::new(detection.single_transaction_ceiling),
            detector: SpikeDetector::from_config(detection),
            reporting_interval: detection.spike_reporting_interval(),
            queue_capacity: config.pipeline.queue_capacity,
            metrics_interval_secs: config.pipeline.metrics_interval_secs,
            sink,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Shared metrics, also handed to sources that count rejected input
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Spawn all pipeline tasks on the current runtime
    pub fn start<S>(self, source: S) -> PipelineHandle
    where
        S: Stream<Item = Transaction> + Send + Unpin + 'static,
    {
        let (trigger, shutdown) = shutdown::channel();
        let (queue_tx, queue_rx) = mpsc::channel(self.queue_capacity);

        // Retention equals the spike horizon: the only horizon the store is trimmed to
        let store = Arc::new(WindowStore::new(self.detector.spike_window()));
        let ceiling = self.checker.ceiling();

        let producer = TransactionProducer::new(source, queue_tx, self.metrics.clone());
        let producer = tokio::spawn(producer.run(shutdown.clone()));

        let consumer = TransactionConsumer::new(
            self.checker,
            store.clone(),
            self.sink.clone(),
            self.metrics.clone(),
        );
        let consumer_trigger = trigger.clone();
        let consumer = tokio::spawn(async move {
            let processed = consumer.run(queue_rx).await;
            consumer_trigger.trigger();
            processed
        });

        let detector = tokio::spawn(self.detector.run(
            store,
            self.sink,
            self.metrics.clone(),
            self.reporting_interval,
            shutdown.clone(),
        ));

        let reporter = (self.metrics_interval_secs > 0).then(|| {
            let reporter = MetricsReporter::new(self.metrics.clone(), self.metrics_interval_secs);
            tokio::spawn(reporter.start(shutdown.clone()))
        });

        info!(
            queue_capacity = self.queue_capacity,
            ceiling,
            "Pipeline started"
        );

        PipelineHandle {
            trigger,
            shutdown,
            producer,
            consumer,
            detector,
            reporter,
            metrics: self.metrics,
        }
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    producer: JoinHandle<u64>,
    consumer: JoinHandle<u64>,
    detector: JoinHandle<()>,
    reporter: Option<JoinHandle<()>>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineHandle {
    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        if self.shutdown.is_triggered() {
            PipelineState::ShuttingDown
        } else {
            PipelineState::Running
        }
    }

    /// Shared pipeline metrics
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Begin shutdown without waiting for it to finish
    pub fn shutdown(&self) {
        if !self.trigger.is_triggered() {
            info!("Pipeline shutting down");
        }
        self.trigger.trigger();
    }

    /// Resolve once shutdown has begun, whether requested or caused by the source ending
    pub async fn stopping(&self) {
        self.shutdown.clone().wait().await;
    }

    /// Wait for every task to stop
    pub async fn join(self) -> Result<PipelineReport> {
        let emitted = self.producer.await.context("Producer task failed")?;
        let processed = self.consumer.await.context("Consumer task failed")?;
        self.detector.await.context("Spike detector task failed")?;
        if let Some(reporter) = self.reporter {
            reporter.await.context("Metrics reporter task failed")?;
        }

        let report = PipelineReport {
            emitted,
            processed,
            discarded: self.metrics.transactions_discarded.load(Ordering::Relaxed),
        };
        info!(
            emitted = report.emitted,
            processed = report.processed,
            discarded = report.discarded,
            "Pipeline stopped"
        );
        Ok(report)
    }

    /// Trigger shutdown and wait for every task to stop
    pub async fn shutdown_and_wait(self) -> Result<PipelineReport> {
        self.shutdown();
        self.join().await
    }
}
