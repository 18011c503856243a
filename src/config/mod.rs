//! Configuration management
//!
//! YAML-based configuration with environment variable overrides and
//! defaults for every setting. Environment variables use the
//! `CHATLOGGER_` prefix and take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            export: ExportConfig::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,
    /// bcrypt work factor; values outside 4..=31 are clamped
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expiry_hours: default_token_expiry_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Export artifact configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

/// Export worker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of concurrent task handlers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Idle delay between queue polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace period for in-flight tasks at shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Scheduling weight of the export lane relative to the default lane
    #[serde(default = "default_export_lane_weight")]
    pub export_lane_weight: u32,
    #[serde(default = "default_default_lane_weight")]
    pub default_lane_weight: u32,
    /// Attempts per task before it is declared dead
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
    /// Per-task processing timeout
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: i64,
    /// Base delay of the exponential retry backoff
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            export_lane_weight: default_export_lane_weight(),
            default_lane_weight: default_default_lane_weight(),
            max_attempts: default_max_attempts(),
            task_timeout_secs: default_task_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://chatlogger.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_jwt_secret() -> String {
    "development-jwt-secret-change-me-in-production".to_string()
}

fn default_token_expiry_hours() -> u64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_concurrency() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_shutdown_grace_secs() -> u64 {
    8
}

fn default_export_lane_weight() -> u32 {
    5
}

fn default_default_lane_weight() -> u32 {
    1
}

fn default_max_attempts() -> i64 {
    3
}

fn default_task_timeout_secs() -> i64 {
    20 * 60
}

fn default_retry_backoff_secs() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides
    /// earlier): defaults, configuration file (YAML), `CHATLOGGER_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("CHATLOGGER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = if let Some(ref path) = config_path {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            } else {
                AppConfig::default()
            }
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/chatlogger/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("chatlogger/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CHATLOGGER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CHATLOGGER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("CHATLOGGER_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("CHATLOGGER_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(cost) = std::env::var("CHATLOGGER_BCRYPT_COST") {
            if let Ok(c) = cost.parse() {
                self.auth.bcrypt_cost = c;
            }
        }
        if let Ok(dir) = std::env::var("CHATLOGGER_EXPORT_DIR") {
            self.export.export_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("CHATLOGGER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(concurrency) = std::env::var("CHATLOGGER_WORKER_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.worker.concurrency = c;
            }
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.jwt_secret == default_jwt_secret() {
            tracing::warn!("Using default JWT secret; set CHATLOGGER_JWT_SECRET for production");
        }
        if self.worker.concurrency == 0 {
            anyhow::bail!("worker.concurrency must be at least 1");
        }
        if self.worker.max_attempts < 1 {
            anyhow::bail!("worker.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.concurrency, 5);
        assert_eq!(config.worker.export_lane_weight, 5);
        assert_eq!(config.worker.default_lane_weight, 1);
        assert_eq!(config.worker.max_attempts, 3);
        assert_eq!(config.worker.task_timeout_secs, 1200);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = AppConfig::default();
        let yaml = serde_norway::to_string(&config).unwrap();
        let parsed: AppConfig = serde_norway::from_str(&yaml).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.export.export_dir, config.export.export_dir);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "server:\n  port: 9090\n";
        let config: AppConfig = serde_norway::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.bcrypt_cost, 10);
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.worker.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
