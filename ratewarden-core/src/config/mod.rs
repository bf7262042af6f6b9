//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::rate_limit::{ProfileName, RateLimitOverride};
use crate::infrastructure::rate_limiter::maintenance::MaintenanceSettings;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Backing store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Storage backend for rate limiting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStorageBackend {
    /// Use Dragonfly/Redis for distributed rate limiting (recommended for production)
    #[default]
    Dragonfly,
    /// Use in-memory storage (suitable for development/single instance)
    Memory,
}

/// Sliding window rate limiting configuration
///
/// Profile parameters come from the built-in table; `profiles` adjusts them
/// once at startup. The resulting registry is immutable for the lifetime of
/// the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Storage backend for window and block state
    pub storage_backend: RateLimitStorageBackend,
    /// Prefix of every key written by the limiter
    pub key_prefix: String,
    /// Upper bound on any single store call, in milliseconds
    pub command_timeout_ms: u64,
    /// Deadline for establishing the store connection at startup, in milliseconds
    pub connect_timeout_ms: u64,
    /// Use the server-side script for atomic admission when the store supports it
    pub atomic_script: bool,
    /// Interval between maintenance passes in seconds
    pub cleanup_interval_seconds: u64,
    /// Keys handled per cleanup batch
    pub cleanup_batch_size: usize,
    /// Pause between cleanup batches in milliseconds
    pub cleanup_batch_pause_ms: u64,
    /// Maximum keys inspected by one cleanup pass
    pub cleanup_max_keys: u64,
    /// Maximum keys inspected by one stats sample
    pub stats_sample_limit: u64,
    /// Startup adjustments to the built-in profiles
    pub profiles: HashMap<ProfileName, RateLimitOverride>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_backend: RateLimitStorageBackend::Dragonfly,
            key_prefix: "rate_limit".to_string(),
            command_timeout_ms: 250,
            connect_timeout_ms: 2_000,
            atomic_script: true,
            cleanup_interval_seconds: 300, // 5 minutes
            cleanup_batch_size: 100,
            cleanup_batch_pause_ms: 10,
            cleanup_max_keys: 10_000,
            stats_sample_limit: 1_000,
            profiles: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Convert to the runtime maintenance settings
    pub fn maintenance_settings(&self) -> MaintenanceSettings {
        MaintenanceSettings {
            batch_size: self.cleanup_batch_size,
            batch_pause: Duration::from_millis(self.cleanup_batch_pause_ms),
            max_cleanup_keys: self.cleanup_max_keys,
            stats_sample_limit: self.stats_sample_limit,
            command_timeout: self.command_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.store.validate()?;
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults when given
    pub fn load_from(path: Option<&std::path::Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder.add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // Environment variables last (highest priority)
        builder = builder.add_source(
            config::Environment::with_prefix("RATEWARDEN")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        // Override store URL from REDIS_URL env var if present (common convention)
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.store.url = url;
        }

        // Validate the loaded configuration
        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.key_prefix, "rate_limit");
        assert_eq!(
            config.rate_limit.storage_backend,
            RateLimitStorageBackend::Dragonfly
        );
    }

    #[test]
    fn test_profiles_deserialize_from_toml() {
        let source = r#"
            [rate_limit]
            storage_backend = "memory"

            [rate_limit.profiles.passwordReset]
            max_requests = 5

            [rate_limit.profiles.upload]
            block_duration_ms = 1000
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            config.rate_limit.storage_backend,
            RateLimitStorageBackend::Memory
        );
        assert_eq!(
            config.rate_limit.profiles[&ProfileName::PasswordReset].max_requests,
            Some(5)
        );
        assert_eq!(
            config.rate_limit.profiles[&ProfileName::Upload].block_duration_ms,
            Some(1000)
        );
    }

    #[test]
    fn test_maintenance_settings_conversion() {
        let config = RateLimitConfig {
            cleanup_batch_size: 7,
            cleanup_batch_pause_ms: 20,
            command_timeout_ms: 80,
            ..RateLimitConfig::default()
        };
        let settings = config.maintenance_settings();
        assert_eq!(settings.batch_size, 7);
        assert_eq!(settings.batch_pause, Duration::from_millis(20));
        assert_eq!(settings.command_timeout, Duration::from_millis(80));
    }
}
