//! Configuration management for the transaction alert pipeline

use crate::error::ConfigError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location, overridable with `ALERTS_CONFIG`
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Where transactions come from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Randomly generated transactions with arrival jitter
    #[default]
    Synthetic,
    /// Newline-delimited JSON transactions read from stdin
    Stdin,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Alerting thresholds and spike-detection windows
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Amount above which a single transaction raises an alert
    pub single_transaction_ceiling: f64,
    /// Recent rate must exceed baseline rate times this to count as a spike
    pub spike_threshold_multiplier: f64,
    /// Long (baseline) horizon in milliseconds
    pub spike_window_ms: u64,
    /// Short (compare) horizon in milliseconds
    pub spike_compare_window_ms: u64,
    /// Period between spike detection cycles in milliseconds
    pub spike_reporting_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            single_transaction_ceiling: 10_000.0,
            spike_threshold_multiplier: 1.2,
            spike_window_ms: 60 * 60 * 1000,
            spike_compare_window_ms: 10 * 60 * 1000,
            spike_reporting_interval_ms: 10 * 60 * 1000,
        }
    }
}

impl DetectionConfig {
    pub fn spike_window(&self) -> Duration {
        Duration::from_millis(self.spike_window_ms)
    }

    pub fn spike_compare_window(&self) -> Duration {
        Duration::from_millis(self.spike_compare_window_ms)
    }

    pub fn spike_reporting_interval(&self) -> Duration {
        Duration::from_millis(self.spike_reporting_interval_ms)
    }

    /// Check the detection settings produce meaningful rates
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ceiling = self.single_transaction_ceiling;
        if !ceiling.is_finite() || ceiling < 0.0 {
            return Err(ConfigError::InvalidAmount {
                field: "single_transaction_ceiling",
                value: ceiling,
            });
        }

        // Written negated so that NaN is rejected too
        if !(self.spike_threshold_multiplier > 1.0) {
            return Err(ConfigError::MultiplierTooSmall(
                self.spike_threshold_multiplier,
            ));
        }

        if self.spike_window_ms == 0 {
            return Err(ConfigError::ZeroDuration("spike_window_ms"));
        }
        if self.spike_compare_window_ms == 0 {
            return Err(ConfigError::ZeroDuration("spike_compare_window_ms"));
        }
        if self.spike_reporting_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("spike_reporting_interval_ms"));
        }

        if self.spike_compare_window_ms >= self.spike_window_ms {
            return Err(ConfigError::CompareWindowTooLong {
                compare: self.spike_compare_window(),
                window: self.spike_window(),
            });
        }

        Ok(())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the producer to consumer handoff queue
    pub queue_capacity: usize,
    /// Seconds between metrics summaries (0 disables the reporter)
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            metrics_interval_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("queue_capacity"));
        }
        Ok(())
    }
}

/// Transaction source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Upper bound (exclusive) for synthetic amounts
    pub max_amount: f64,
    /// Minimum synthetic inter-arrival delay
    pub min_delay_ms: u64,
    /// Maximum synthetic inter-arrival delay
    pub max_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            max_amount: 11_000.0,
            min_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_amount.is_finite() || self.max_amount <= 0.0 {
            return Err(ConfigError::InvalidAmount {
                field: "max_amount",
                value: self.max_amount,
            });
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidDelayRange {
                min_ms: self.min_delay_ms,
                max_ms: self.max_delay_ms,
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from `ALERTS_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("ALERTS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; environment variables prefixed with `ALERTS_`
    /// override it, using `__` between section and key
    /// (`ALERTS_DETECTION__SPIKE_WINDOW_MS=60000`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("ALERTS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.pipeline.validate()?;
        self.source.validate()
    }
}
