use crate::error::{DbCheckError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for the health-check daemon and its controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Listener address, protocol literals and the backend to probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to
    #[serde(default = "default_address")]
    pub address: String,

    /// Port the listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Exact payload a client sends to request a liveness answer
    #[serde(default = "default_health_check_token")]
    pub health_check_token: String,

    /// Reply sent when the backend is alive
    #[serde(default = "default_up_token")]
    pub up_token: String,

    /// Reply sent when the backend is down or the request is invalid
    #[serde(default = "default_down_token")]
    pub down_token: String,

    #[serde(default)]
    pub backend: BackendConfig,

    /// Upper bound on the single request read. Unset means wait forever.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// One deadline for a whole backend probe: connect, query and close.
    /// Unset means wait forever.
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,
}

/// Connection parameters and liveness query for the monitored database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_host")]
    pub host: String,

    #[serde(default = "default_backend_port")]
    pub port: u16,

    #[serde(default = "default_backend_user")]
    pub user: String,

    #[serde(default = "default_backend_password")]
    pub password: String,

    #[serde(default = "default_backend_database")]
    pub database: String,

    /// Query whose first row carries the liveness marker
    #[serde(default = "default_backend_query")]
    pub query: String,

    /// Zero-based column holding the marker
    #[serde(default = "default_marker_column")]
    pub marker_column: usize,

    /// Value the marker column must equal for the backend to count as alive
    #[serde(default = "default_expected_marker")]
    pub expected_marker: String,
}

/// Pid file and lifecycle timing for the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Directory the daemon changes into after the first fork
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Pause between stop and start during a restart
    #[serde(default = "default_settle_interval")]
    pub settle_interval_ms: u64,

    /// Delay between termination signals while stopping
    #[serde(default = "default_stop_poll_interval")]
    pub stop_poll_interval_ms: u64,
}

/// Log destination and verbosity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Filter directive, overridden by RUST_LOG when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions for serde
fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10888
}

fn default_health_check_token() -> String {
    "8675309".to_string()
}

fn default_up_token() -> String {
    "SERVER_UP".to_string()
}

fn default_down_token() -> String {
    "SERVER_DN".to_string()
}

fn default_backend_host() -> String {
    "localhost".to_string()
}

fn default_backend_port() -> u16 {
    3306
}

fn default_backend_user() -> String {
    "root".to_string()
}

fn default_backend_password() -> String {
    "default".to_string()
}

fn default_backend_database() -> String {
    "intel_test".to_string()
}

fn default_backend_query() -> String {
    "SELECT * FROM healthcheck".to_string()
}

fn default_marker_column() -> usize {
    1
}

fn default_expected_marker() -> String {
    "DB_ALIVE".to_string()
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/dbcheck.pid")
}

fn default_workdir() -> PathBuf {
    PathBuf::from("/")
}

fn default_settle_interval() -> u64 {
    3000
}

fn default_stop_poll_interval() -> u64 {
    100
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/tmp/dbcheck.log")
}

fn default_log_level() -> String {
    "debug".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            health_check_token: default_health_check_token(),
            up_token: default_up_token(),
            down_token: default_down_token(),
            backend: BackendConfig::default(),
            read_timeout_ms: None,
            probe_timeout_ms: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            port: default_backend_port(),
            user: default_backend_user(),
            password: default_backend_password(),
            database: default_backend_database(),
            query: default_backend_query(),
            marker_column: default_marker_column(),
            expected_marker: default_expected_marker(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            workdir: default_workdir(),
            settle_interval_ms: default_settle_interval(),
            stop_poll_interval_ms: default_stop_poll_interval(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load the configuration file if one was given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(AppConfig::default()),
        }
    }

    /// Load configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbCheckError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(DbCheckError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Parse TOML configuration
    pub fn parse_toml(contents: &str) -> Result<AppConfig> {
        toml::from_str(contents)
            .map_err(|e| DbCheckError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// Parse JSON configuration
    pub fn parse_json(contents: &str) -> Result<AppConfig> {
        serde_json::from_str(contents)
            .map_err(|e| DbCheckError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;

        if self.daemon.pid_file.as_os_str().is_empty() {
            return Err(DbCheckError::ConfigValidationError(
                "daemon.pid_file must not be empty".to_string(),
            ));
        }

        if self.daemon.stop_poll_interval_ms == 0 {
            return Err(DbCheckError::ConfigValidationError(
                "daemon.stop_poll_interval_ms must be at least 1".to_string(),
            ));
        }

        if self.log.file.as_os_str().is_empty() {
            return Err(DbCheckError::ConfigValidationError(
                "log.file must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand environment variables in path fields
    fn expand_env_vars(&mut self) {
        self.daemon.pid_file = expand_env_in_path(&self.daemon.pid_file);
        self.daemon.workdir = expand_env_in_path(&self.daemon.workdir);
        self.log.file = expand_env_in_path(&self.log.file);
    }
}

impl ServerConfig {
    /// `address:port` as handed to the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(DbCheckError::ConfigValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }

        for (field, value) in [
            ("health_check_token", &self.health_check_token),
            ("up_token", &self.up_token),
            ("down_token", &self.down_token),
        ] {
            if value.is_empty() {
                return Err(DbCheckError::ConfigValidationError(format!(
                    "server.{} must not be empty",
                    field
                )));
            }
        }

        if self.up_token == self.down_token {
            return Err(DbCheckError::ConfigValidationError(
                "server.up_token and server.down_token must differ".to_string(),
            ));
        }

        if self.backend.host.is_empty()
            || self.backend.database.is_empty()
            || self.backend.query.is_empty()
        {
            return Err(DbCheckError::ConfigValidationError(
                "backend host, database and query are required".to_string(),
            ));
        }

        Ok(())
    }
}

impl DaemonConfig {
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }
}

/// Expand `$VAR` and `${VAR}` references in a string
fn expand_env_in_string(s: &str) -> String {
    let mut result = s.to_string();

    for (key, value) in std::env::vars() {
        result = result.replace(&format!("${{{}}}", key), &value);
        result = result.replace(&format!("${}", key), &value);
    }

    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_deployed_protocol() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_addr(), "0.0.0.0:10888");
        assert_eq!(config.server.health_check_token, "8675309");
        assert_eq!(config.server.up_token, "SERVER_UP");
        assert_eq!(config.server.down_token, "SERVER_DN");
        assert_eq!(config.server.backend.expected_marker, "DB_ALIVE");
        assert_eq!(config.server.backend.marker_column, 1);
        assert!(config.server.read_timeout().is_none());
        assert!(config.server.probe_timeout().is_none());
        assert_eq!(config.daemon.settle_interval(), Duration::from_secs(3));
        assert_eq!(config.daemon.stop_poll_interval(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
[server]
port = 9999
up_token = "OK"

[server.backend]
host = "db.internal"
"#;
        let config = AppConfig::parse_toml(toml).unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.up_token, "OK");
        assert_eq!(config.server.down_token, "SERVER_DN");
        assert_eq!(config.server.backend.host, "db.internal");
        assert_eq!(config.server.backend.database, "intel_test");
        assert_eq!(config.daemon, DaemonConfig::default());
    }

    #[test]
    fn test_validate_rejects_identical_tokens() {
        let mut config = AppConfig::default();
        config.server.down_token = config.server.up_token.clone();

        let result = config.validate();
        assert!(matches!(
            result,
            Err(DbCheckError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_health_check_token() {
        let mut config = AppConfig::default();
        config.server.health_check_token.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.daemon.stop_poll_interval_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dbcheck.yaml");
        fs::write(&path, "server: {}").unwrap();

        let result = AppConfig::from_file(&path);
        assert!(matches!(result, Err(DbCheckError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_expansion_in_paths() {
        std::env::set_var("DBCHECK_TEST_RUN_DIR", "/var/run/dbcheck");
        let expanded = expand_env_in_path(Path::new("${DBCHECK_TEST_RUN_DIR}/dbcheck.pid"));
        assert_eq!(expanded, PathBuf::from("/var/run/dbcheck/dbcheck.pid"));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
