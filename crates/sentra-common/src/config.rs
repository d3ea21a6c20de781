//! Configuration for Sentra

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Tracking configuration
    pub tracking: TrackingConfig,

    /// Send queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// AI content assist configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Minimum accepted password length
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_min_password_length() -> usize {
    8
}

/// Outbound SMTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Submission port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Relay username
    pub username: Option<String>,

    /// Relay password
    pub password: Option<String>,

    /// Default sender address when a campaign does not set one
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Default sender display name
    pub from_name: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: None,
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

/// Tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Public base URL for tracking links and pixels, no trailing slash
    pub base_url: String,

    /// Secret used for unsubscribe token and webhook signatures
    pub secret: String,

    /// Fallback redirect target for unknown or expired click tokens
    #[serde(default = "default_safe_redirect_url")]
    pub safe_redirect_url: String,

    /// Days a click-token mapping stays resolvable
    #[serde(default = "default_link_ttl_days")]
    pub link_ttl_days: i64,
}

fn default_safe_redirect_url() -> String {
    "https://example.com".to_string()
}

fn default_link_ttl_days() -> i64 {
    90
}

/// Send queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds between worker polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Jobs claimed per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Concurrent deliveries
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_batch_size() -> i64 {
    25
}

fn default_concurrency() -> usize {
    4
}

/// AI content assist configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Enable the content assist endpoints
    #[serde(default)]
    pub enabled: bool,

    /// Generative API base URL
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// Provider API key
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_ai_endpoint(),
            api_key: None,
            model: default_ai_model(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

fn default_ai_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_ai_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/sentra/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_address, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let queue = QueueConfig::default();
        assert_eq!(queue.poll_interval_secs, 5);
        assert_eq!(queue.concurrency, 4);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 9090

[database]
url = "postgres://localhost/sentra"

[tracking]
base_url = "https://track.example.com"
secret = "dev-secret"

[smtp]
host = "smtp.example.com"
from_address = "news@example.com"

[ai]
enabled = true
api_key = "test-key"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "postgres://localhost/sentra");
        assert_eq!(config.tracking.base_url, "https://track.example.com");
        assert_eq!(config.tracking.link_ttl_days, 90);
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert!(config.ai.enabled);
        assert_eq!(config.ai.model, "gemini-1.5-flash");
    }
}
