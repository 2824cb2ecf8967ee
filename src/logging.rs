//! Logging setup for the peer-study binary.
//!
//! Logs go to the console and to daily-rotating files. The library itself only
//! emits `tracing` events; installing a subscriber is left to the binary (or to
//! any embedding application).
//!
//! ## Files
//!
//! - `peer-study.<date>.log`: everything at the active level
//! - `error.<date>.log`: warnings and errors only, e.g. columns the classifier
//!   dropped or categories unseen at re-encoding time
//!
//! ## Usage
//!
//! ```no_run
//! peer_study::logging::init(None).expect("Failed to initialize logging");
//! tracing::info!("Pipeline started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const LOG_PREFIX: &str = "peer-study";

/// Platform log directory, e.g. `~/.local/share/peer-study/logs` on Linux.
pub fn default_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join(LOG_PREFIX).join("logs"))
}

/// Install console and file logging. `log_dir` overrides the platform default.
///
/// The level defaults to `info` and can be changed with `RUST_LOG`.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or file appenders fail
pub fn init(log_dir: Option<&Path>) -> Result<PathBuf> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_dir()?,
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::debug!(
        "Logging initialized, writing to {}",
        current_log_path(&log_dir).display()
    );
    Ok(log_dir)
}

/// Path of today's main log file inside `log_dir`.
fn current_log_path(log_dir: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    log_dir.join(format!("{LOG_PREFIX}.{today}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir() {
        let log_dir = default_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("peer-study/logs") || log_dir.ends_with("peer-study\\logs"));
    }

    #[test]
    fn test_current_log_path_is_dated() {
        let path = current_log_path(Path::new("/tmp/logs"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("peer-study."));
        assert!(name.ends_with(".log"));
    }
}
