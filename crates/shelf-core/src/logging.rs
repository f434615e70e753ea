//! Tracing subscriber setup.
//!
//! The kiosk owns the terminal, so it logs to a daily-rotated file.
//! One-shot CLI commands log to stderr.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable holding the log filter (e.g. `shelf_core=debug`).
pub const LOG_ENV: &str = "SHELF_LOG";

const LOG_FILE_PREFIX: &str = "shelf.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a file subscriber for the interactive kiosk.
///
/// Returns the writer guard; dropping it flushes and stops the writer thread.
/// Returns `Ok(None)` when file logging is disabled.
pub fn init_file(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if !config.file_logging {
        return Ok(None);
    }

    let dir = config.effective_directory();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(Some(guard))
}

/// Installs a stderr subscriber for one-shot commands.
///
/// Quiet by default (`warn`) so command output stays readable.
pub fn init_stderr() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
