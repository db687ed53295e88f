//! Transaction Alert Pipeline - Main Entry Point
//!
//! Reads transactions from the configured source, raises high-amount and
//! rate-spike alerts, and shuts down cleanly on Ctrl-C / SIGTERM or when the
//! source ends.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use transaction_alert_pipeline::{
    config::{AppConfig, LogFormat, LoggingConfig, SourceKind},
    sink::{AlertSink, LogSink},
    source::{self, TransactionGenerator},
    Pipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: it decides the log format
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Transaction Alert Pipeline");
    info!(
        "Ceiling: {:.2}, spike multiplier: {:.2}, spike window: {:?}, compare window: {:?}, reporting every {:?}",
        config.detection.single_transaction_ceiling,
        config.detection.spike_threshold_multiplier,
        config.detection.spike_window(),
        config.detection.spike_compare_window(),
        config.detection.spike_reporting_interval()
    );

    let sink: Arc<dyn AlertSink> = Arc::new(LogSink::new());
    let pipeline = Pipeline::new(&config, sink)?;
    let metrics = pipeline.metrics();

    let source = match config.source.kind {
        SourceKind::Synthetic => {
            info!(
                max_amount = config.source.max_amount,
                min_delay_ms = config.source.min_delay_ms,
                max_delay_ms = config.source.max_delay_ms,
                "Using synthetic transaction source"
            );
            TransactionGenerator::new(&config.source).into_stream()
        }
        SourceKind::Stdin => {
            info!("Reading JSON transactions from stdin");
            source::json_lines(BufReader::new(tokio::io::stdin()), metrics.clone())
        }
    };

    let handle = pipeline.start(source);
    info!("Press CTRL+C to shut down gracefully");

    tokio::select! {
        _ = wait_for_termination() => {
            info!("Termination signal received");
        }
        _ = handle.stopping() => {
            info!("Transaction source finished");
        }
    }

    info!("Waiting for queued transactions to be processed...");
    let report = handle.shutdown_and_wait().await?;
    info!(
        emitted = report.emitted,
        processed = report.processed,
        discarded = report.discarded,
        "Terminating"
    );

    metrics.print_summary();
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("transaction_alert_pipeline={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
