// Logs module - file-backed tracing for the controller and the daemon

use crate::config::LogConfig;
use crate::error::{DbCheckError, Result};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Handle to the process-wide log sink
///
/// Created once by [`init`] and passed explicitly to the controller and the
/// daemonizer. The file writer is synchronous and spawns no thread, so it
/// keeps working in the grandchild after the double fork.
#[derive(Debug, Clone)]
pub struct LogHandle {
    file: PathBuf,
    level: String,
}

impl LogHandle {
    /// Path of the log file
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Filter directive the subscriber was built with
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Span tagging every event of one component
    pub fn component(&self, name: &'static str) -> tracing::Span {
        tracing::debug_span!("dbcheck", component = name)
    }
}

/// Install the global subscriber writing to the configured log file
pub fn init(config: &LogConfig) -> Result<LogHandle> {
    let (subscriber, handle) = build_subscriber(config)?;

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DbCheckError::LogError(format!("Failed to install subscriber: {}", e)))?;

    Ok(handle)
}

/// Build the subscriber without installing it
pub fn build_subscriber(
    config: &LogConfig,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogHandle)> {
    let file_name = config
        .file
        .file_name()
        .ok_or_else(|| {
            DbCheckError::LogError(format!("Log path has no file name: {}", config.file.display()))
        })?
        .to_string_lossy()
        .into_owned();

    let dir = match config.file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| DbCheckError::LogError(format!("Failed to create log directory: {}", e)))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir)
        .map_err(|e| DbCheckError::LogError(format!("Failed to open log file: {}", e)))?;

    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            DbCheckError::LogError(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true),
    );

    let handle = LogHandle {
        file: config.file.clone(),
        level: config.level.clone(),
    };

    Ok((subscriber, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_events_reach_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = LogConfig {
            file: temp_dir.path().join("nested").join("dbcheck.log"),
            level: "debug".to_string(),
        };

        let (subscriber, handle) = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = handle.component("test");
            let _enter = span.enter();
            tracing::info!("health check logging online");
        });

        let contents = std::fs::read_to_string(handle.file()).unwrap();
        assert!(contents.contains("health check logging online"));
        assert!(contents.contains("component=\"test\""));
    }

    #[test]
    fn test_path_without_file_name_is_rejected() {
        let config = LogConfig {
            file: PathBuf::from("/"),
            level: "info".to_string(),
        };

        assert!(matches!(
            build_subscriber(&config),
            Err(DbCheckError::LogError(_))
        ));
    }
}
