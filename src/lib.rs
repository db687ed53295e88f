//! Transaction Alert Pipeline Library
//!
//! Streaming monitor for a transaction feed. Raises an alert for any single
//! transaction above an amount ceiling, and for sudden spikes in the overall
//! transaction rate relative to a longer baseline.

pub mod config;
pub mod consumer;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod producer;
pub mod rate;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod threshold;
pub mod types;
pub mod window;

pub use config::AppConfig;
pub use detector::SpikeDetector;
pub use error::ConfigError;
pub use pipeline::{Pipeline, PipelineHandle, PipelineReport, PipelineState};
pub use sink::{AlertSink, ChannelSink, LogSink};
pub use threshold::ThresholdChecker;
pub use types::{alert::Alert, transaction::Transaction};
pub use window::{SlidingWindow, WindowStore};
