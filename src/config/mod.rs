//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig, AuthConfig)
//! - [`limits`]: Paging, listing and content limits (LimitsConfig)
//! - [`defaults`]: Serde default value functions
//! - [`validation`]: Startup validation of a loaded config

mod defaults;
mod limits;
mod types;
pub mod validation;

pub use limits::LimitsConfig;
pub use types::{
    AuthConfig, Config, ConfigError, DatabaseConfig, RetryConfig, ServerConfig, TopicsConfig,
};
