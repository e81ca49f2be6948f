use std::fs;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// `log_level` takes the operator values DEBUG, INFO, or ERROR; anything
/// unrecognized falls back to INFO, matching the flag default.
pub fn init_logging(log_level: &str) {
    let level = match log_level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "ERROR" => "error",
        _ => "info",
    };

    // Ensure logs directory exists
    let _ = fs::create_dir_all("logs");

    // Non-blocking file appender with daily rotation, JSON formatted
    let file_appender = tracing_appender::rolling::daily("logs", "ai-nozzle.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ai_nozzle={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // Keep the guard alive for the process lifetime so logs are flushed
    std::mem::forget(guard);
}
