use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the dbcheck daemon and its controller
#[derive(Debug, Error)]
pub enum DbCheckError {
    // Daemonization errors
    #[error("Working directory does not exist: {0}")]
    InvalidWorkdir(PathBuf),

    #[error("Fork #{stage} failed: {source}")]
    ForkFailed {
        stage: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("Path change to {path} failed: {source}")]
    ChdirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("setsid failed: {0}")]
    SessionFailed(String),

    #[error("Failed to redirect standard streams: {0}")]
    RedirectFailed(String),

    // Lifecycle errors
    #[error("Pidfile {} already exists (pid {pid}). Daemon already running?", .path.display())]
    DaemonAlreadyRunning { pid: u32, path: PathBuf },

    #[error("Signal error: {0}")]
    SignalError(String),

    #[error("Pid file error: {0}")]
    PidFileError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Server errors
    #[error("Failed to bind {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Log error: {0}")]
    LogError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbCheckError {
    /// Process exit status for an operator command that failed with this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type alias for dbcheck operations
pub type Result<T> = std::result::Result<T, DbCheckError>;
