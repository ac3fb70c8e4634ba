//! Tracing subscriber setup for hosts embedding the registry.

use crate::config::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs console logging and, when `log_dir` is configured, a JSON file
/// layer with daily rotation.
///
/// The returned guard must be kept alive for file output to be flushed.
/// Returns `None` for the guard when no file layer was requested. Installing a
/// second global subscriber is silently ignored.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            if let Err(e) = std::fs::create_dir_all(log_dir) {
                eprintln!("Warning: Could not create log directory {:?}: {}", log_dir, e);
            }
            let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "multidb-registry.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(file_layer)
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Logging initialized - log directory: {:?}", config.log_dir);
    }

    guard
}
