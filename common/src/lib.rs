pub mod error;
pub mod format;

pub use error::{CommonError, Result};
pub use format::{format_bytes, format_rate};

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Build the log filter. `RUST_LOG` takes precedence over the configured level.
pub fn build_filter(log_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(log_level).map_err(|e| CommonError::InvalidLogLevel {
        level: log_level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global tracing subscriber.
///
/// With a `log_dir` the output goes to a daily-rolling file through a
/// non-blocking writer; the returned guard must be held until shutdown or
/// buffered lines are lost. Without one, logs go to stdout.
pub fn init_tracing(
    log_dir: Option<&str>,
    log_file: &str,
    log_level: &str,
) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(log_level)?;

    if let Some(log_dir) = log_dir {
        fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, log_file);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_ansi(false),
            )
            .try_init()
            .map_err(|e| CommonError::Tracing(e.to_string()))?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_ansi(true),
            )
            .try_init()
            .map_err(|e| CommonError::Tracing(e.to_string()))?;
        Ok(None)
    }
}
