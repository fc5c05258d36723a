//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("database.max_connections must be at least 1")]
    NoConnections,
    #[error("auth.user_header is not a valid header name: '{0}'")]
    InvalidUserHeader(String),
    #[error("limits.default_page_size ({0}) exceeds limits.max_page_size ({1})")]
    PageSizeOrder(u32, u32),
    #[error("limits.max_page_size must be at least 1")]
    ZeroPageSize,
    #[error("retry.attempts must be at least 1")]
    ZeroRetryAttempts,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    // Database path validation
    let db = &config.database;
    if db.path != ":memory:" {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }
    if db.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let header = &config.auth.user_header;
    if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidUserHeader(header.clone()));
    }

    let limits = &config.limits;
    if limits.max_page_size == 0 {
        errors.push(ValidationError::ZeroPageSize);
    } else if limits.default_page_size > limits.max_page_size {
        errors.push(ValidationError::PageSizeOrder(
            limits.default_page_size,
            limits.max_page_size,
        ));
    }

    if config.retry.attempts == 0 {
        errors.push(ValidationError::ZeroRetryAttempts);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
