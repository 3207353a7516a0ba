//! `tracing` subscriber setup for the command-line front end.

use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_LOG_FILTER, LoggingConfig};
use crate::error::{AppError, Result};

/// Keeps the background log writer alive. Drop it last so buffered lines
/// are flushed before exit.
#[derive(Debug)]
#[must_use]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.filter`, which wins over
/// [`DEFAULT_LOG_FILTER`]. With `config.file` set, the file is truncated and
/// logs are written there without ANSI colours; otherwise they go to stderr.
///
/// # Errors
///
/// Returns [`AppError::Logging`] if the filter is invalid or a subscriber
/// is already installed, and [`AppError::Io`] if the log file cannot be
/// created.
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let env = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(env.as_deref(), config.filter.as_deref());
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| AppError::Logging(format!("invalid filter {directive:?}: {e}")))?;

    match &config.file {
        Some(path) => {
            let file = prepare_log_file(path)?;
            let (writer, worker) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| AppError::Logging(e.to_string()))?;
            Ok(LogGuard {
                _worker: Some(worker),
            })
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| AppError::Logging(e.to_string()))?;
            Ok(LogGuard { _worker: None })
        }
    }
}

/// Pick the filter directive, skipping blank values.
pub fn filter_directive<'a>(env: Option<&'a str>, configured: Option<&'a str>) -> &'a str {
    [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER)
}

/// Create `path` (and its parents), discarding any previous run's log.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the directory or file cannot be created.
pub fn prepare_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_beats_config() {
        assert_eq!(
            filter_directive(Some("crimescrape=trace"), Some("crimescrape=warn")),
            "crimescrape=trace"
        );
    }

    #[test]
    fn config_used_without_env() {
        assert_eq!(
            filter_directive(None, Some("crimescrape=warn")),
            "crimescrape=warn"
        );
    }

    #[test]
    fn blank_values_fall_through() {
        assert_eq!(filter_directive(Some("  "), None), DEFAULT_LOG_FILTER);
        assert_eq!(filter_directive(None, None), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn log_file_is_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crimescrape.log");
        std::fs::write(&path, "previous run\n").expect("write");

        prepare_log_file(&path).expect("prepare");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn log_file_parents_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("today").join("run.log");

        prepare_log_file(&path).expect("prepare");
        assert!(path.is_file());
    }
}
