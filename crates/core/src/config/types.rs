use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
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

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Operator key, required when `method = "api_key"`.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Every caller is trusted as the operator.
    None,
    /// Callers presenting the configured key are the operator; everyone else is anonymous.
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("queueline.db")
}

/// Queue behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Offset from UTC, in minutes, used to decide the calendar date of a service day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Total attempts for one transaction before giving up with a transient error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step between conflicting attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How long SQLite waits on a held write lock before reporting a conflict.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl QueueConfig {
    /// The configured offset, if it is representable.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    250
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_deref()
                    .is_some_and(|key| !key.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            queue: config.queue.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_valid_config_with_none_auth() {
        let toml = r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let toml = r#"
[auth]
method = "none"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "queueline.db");
        assert_eq!(config.queue.utc_offset_minutes, 0);
        assert_eq!(config.queue.max_attempts, 10);
        assert_eq!(config.queue.retry_backoff_ms, 5);
        assert_eq!(config.queue.busy_timeout_ms, 250);
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_api_key_auth_and_queue_section() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "counter-7"

[queue]
utc_offset_minutes = 420
max_attempts = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key.as_deref(), Some("counter-7"));
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(
            config.queue.utc_offset(),
            FixedOffset::east_opt(7 * 3600)
        );
    }

    #[test]
    fn test_utc_offset_out_of_range() {
        let queue = QueueConfig {
            utc_offset_minutes: 24 * 60,
            ..QueueConfig::default()
        };
        assert!(queue.utc_offset().is_none());
    }

    #[test]
    fn test_sanitized_config_hides_key() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("secret".to_string()),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
        };
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
