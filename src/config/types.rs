//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_database_path, default_max_connections, default_retry_attempts,
    default_retry_backoff_ms, default_topics, default_true, default_user_header,
};
use super::limits::LimitsConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and listener.
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Identity header handling and bootstrap admins.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Paging and content limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Retry policy for busy/locked database writes.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Topic catalogue seeding.
    #[serde(default)]
    pub topics: TopicsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Display name used in logs and `/health`.
    pub name: String,
    /// HTTP listen address (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
    /// Expose Prometheus metrics on `/metrics` (default: true).
    #[serde(default = "default_true")]
    pub metrics: bool,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Pool size for file-backed databases (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Identity configuration.
///
/// Authentication happens upstream; the fronting proxy forwards the
/// identity-provider user id in `user_header`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the authenticated user id (default: "x-user-id").
    #[serde(default = "default_user_header")]
    pub user_header: String,
    /// User ids granted the admin role whenever their profile is synced.
    #[serde(default)]
    pub bootstrap_admins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
            bootstrap_admins: Vec::new(),
        }
    }
}

/// Retry policy for writes that hit SQLITE_BUSY / SQLITE_LOCKED.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3).
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    /// Fixed delay between attempts in milliseconds (default: 200).
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Topic catalogue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicsConfig {
    /// Topics inserted when the topic table is empty at startup.
    #[serde(default = "default_topics")]
    pub defaults: Vec<String>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            defaults: default_topics(),
        }
    }
}
