//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::InitError;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

const DEFAULT_LOG_FILE_NAME: &str = "ipp.log";

/// initiate the global tracing subscriber
///
/// Logs always go to stderr. When `log_file` is set, a daily rotating copy is
/// written next to it; the returned guard must be kept alive until exit so
/// buffered lines are flushed.
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, InitError> {
    let default_level = if debug {
        filter::LevelFilter::DEBUG
    } else {
        filter::LevelFilter::INFO
    };
    let env_filter = || {
        filter::EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    };

    let stderr_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let Some(log_file) = log_file else {
        registry().with(stderr_layer).init();
        return Ok(None);
    };

    let (dir, prefix) = split_log_path(log_file);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(3)
        .build(dir)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    registry().with(stderr_layer).with(file_layer).init();
    Ok(Some(file_guard))
}

/// Splits a log file path into the directory and the rolling file prefix.
fn split_log_path(log_file: &Path) -> (&Path, String) {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = log_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
    (dir, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_absolute_log_path() {
        let (dir, prefix) = split_log_path(Path::new("/var/log/ipp/webhook.log"));
        assert_eq!(dir, Path::new("/var/log/ipp"));
        assert_eq!(prefix, "webhook.log");
    }

    #[test]
    fn bare_file_name_lands_in_current_dir() {
        let (dir, prefix) = split_log_path(Path::new("webhook.log"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(prefix, "webhook.log");
    }

    #[test]
    fn directory_only_path_uses_default_name() {
        let (dir, prefix) = split_log_path(Path::new("/"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(prefix, DEFAULT_LOG_FILE_NAME);
    }
}
