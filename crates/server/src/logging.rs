//! Logging setup for the domsentry server
//!
//! Logs to stderr and to a daily-rotated file under the data directory.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,domsentry_server=info";

/// Initialize logging with file output.
///
/// The returned guard must live as long as the process so buffered lines
/// are flushed on exit.
pub fn init_logging(data_dir: Option<&Path>) -> WorkerGuard {
    let log_dir = log_dir_for(data_dir);
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "domsentry-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(true))
        .init();

    tracing::info!("Logging initialized, log directory: {:?}", log_dir);

    guard
}

/// `<data_dir>/logs`, or the default data directory's.
pub fn log_dir_for(data_dir: Option<&Path>) -> PathBuf {
    match data_dir {
        Some(dir) => dir.join("logs"),
        None => default_data_dir().join("logs"),
    }
}

/// Platform data directory for domsentry.
pub fn default_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("domsentry");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".domsentry");
    }
    PathBuf::from("./domsentry_data")
}
