//! Configuration validation module

use crate::config::{LoggingConfig, RateLimitConfig, StoreConfig};
use crate::domain::rate_limit::ProfileRegistry;

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Store configuration error: {message}")]
    Store { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::store("Store URL cannot be empty"));
        }

        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::store(format!(
                "Store URL must start with redis:// or rediss://, got: {}",
                self.url
            )));
        }

        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.key_prefix.is_empty() {
            return Err(ValidationError::rate_limit("key_prefix cannot be empty"));
        }

        // Maintenance SCAN patterns are built from the prefix
        if self.key_prefix.contains(['*', '?', '[', ']', '\\']) {
            return Err(ValidationError::rate_limit(format!(
                "key_prefix must not contain glob characters (* ? [ ] \\), got: {}",
                self.key_prefix
            )));
        }

        if self.command_timeout_ms == 0 {
            return Err(ValidationError::rate_limit(
                "command_timeout_ms must be greater than 0",
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::rate_limit(
                "connect_timeout_ms must be greater than 0",
            ));
        }

        if self.cleanup_interval_seconds == 0 {
            return Err(ValidationError::rate_limit(
                "cleanup_interval_seconds must be greater than 0",
            ));
        }

        if self.cleanup_batch_size == 0 {
            return Err(ValidationError::rate_limit(
                "cleanup_batch_size must be greater than 0",
            ));
        }

        if self.cleanup_max_keys == 0 || self.stats_sample_limit == 0 {
            return Err(ValidationError::rate_limit(
                "cleanup_max_keys and stats_sample_limit must be greater than 0",
            ));
        }

        ProfileRegistry::with_overrides(&self.profiles)
            .map_err(|e| ValidationError::rate_limit(e.to_string()))?;

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ValidationError::logging(format!(
                "Invalid log level '{}', expected one of: {}",
                self.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ValidationError::logging(format!(
                "Invalid log format '{}', expected one of: {}",
                self.format,
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}
