//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the TimeSked application.

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::{Result, TimeSkedError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must live as long as the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "timesked.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| TimeSkedError::Config(format!("Failed to install subscriber: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log a progress stage reached for an inbound trigger
pub fn log_pipeline_stage(chat_id: i64, message_id: i32, stage: &str) {
    info!(
        chat_id = chat_id,
        message_id = message_id,
        stage = stage,
        "Pipeline stage reached"
    );
}

/// Log the outcome of one extraction round
pub fn log_extraction_attempt(chat_id: i64, round: u32, outcome: &str) {
    if outcome == "ok" {
        debug!(chat_id = chat_id, round = round, "Extraction round succeeded");
    } else {
        warn!(
            chat_id = chat_id,
            round = round,
            outcome = outcome,
            "Extraction round failed"
        );
    }
}

/// Log calendar operations
pub fn log_calendar_operation(chat_id: i64, operation: &str, count: usize, success: bool) {
    if success {
        info!(
            chat_id = chat_id,
            operation = operation,
            count = count,
            "Calendar operation completed"
        );
    } else {
        error!(
            chat_id = chat_id,
            operation = operation,
            count = count,
            "Calendar operation failed"
        );
    }
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
