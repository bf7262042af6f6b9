//! Rate Limiter Service
//!
//! The main service that coordinates rate limiting across the application.
//! Provides a unified interface for:
//! - Per-IP, per-user and combined admission checks against named profiles
//! - Manual unblocking and read-only quota inspection
//! - Keyspace stats, stale-key cleanup and store health for operators

use super::maintenance::RateLimitMaintenance;
use super::sliding_window::SlidingWindowLimiter;
use super::storage::{
    DragonflyRateLimitStorage, InMemoryRateLimitStorage, RateLimitStorage, with_timeout,
};
use super::types::{CleanupReport, RateLimitResult, RateLimitStats, RateLimitStatus, StoreHealth};
use crate::config::{RateLimitConfig, RateLimitStorageBackend};
use crate::domain::rate_limit::{
    ProfileName, ProfileRegistry, RateLimitError, RateLimitKey, RateLimitOverride, RequestOutcome,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Main rate limiter service
pub struct RateLimiterService {
    /// Sliding window admission
    limiter: SlidingWindowLimiter,
    /// Stats and cleanup over the limiter namespaces
    maintenance: RateLimitMaintenance,
    /// Profiles fixed at startup
    registry: ProfileRegistry,
    /// Storage backend
    storage: Arc<dyn RateLimitStorage>,
    /// Configuration
    config: RateLimitConfig,
}

impl RateLimiterService {
    /// Create a new rate limiter service with explicit Dragonfly URL
    ///
    /// An unreachable Dragonfly backend falls back to in-memory storage so
    /// the process still starts; only invalid profile configuration fails.
    pub async fn new_with_url(
        config: RateLimitConfig,
        dragonfly_url: &str,
    ) -> Result<Self, RateLimitError> {
        let storage: Arc<dyn RateLimitStorage> = match config.storage_backend {
            RateLimitStorageBackend::Dragonfly => {
                match DragonflyRateLimitStorage::new(dragonfly_url, config.connect_timeout()).await {
                    Ok(storage) => {
                        info!(
                            "Rate limiter using Dragonfly storage backend at {}",
                            dragonfly_url
                        );
                        Arc::new(storage)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to connect to Dragonfly for rate limiting, falling back to in-memory: {}",
                            e
                        );
                        Arc::new(InMemoryRateLimitStorage::new())
                    }
                }
            }
            RateLimitStorageBackend::Memory => {
                info!("Rate limiter using in-memory storage backend");
                Arc::new(InMemoryRateLimitStorage::new())
            }
        };

        Self::with_storage(storage, config)
    }

    /// Create with a custom storage backend
    pub fn with_storage(
        storage: Arc<dyn RateLimitStorage>,
        config: RateLimitConfig,
    ) -> Result<Self, RateLimitError> {
        let registry = ProfileRegistry::with_overrides(&config.profiles)?;

        let limiter = SlidingWindowLimiter::new(
            Arc::clone(&storage),
            &config.key_prefix,
            config.command_timeout(),
            config.atomic_script,
        );
        let maintenance = RateLimitMaintenance::new(
            Arc::clone(&storage),
            &config.key_prefix,
            config.maintenance_settings(),
        );

        Ok(Self {
            limiter,
            maintenance,
            registry,
            storage,
            config,
        })
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check and count one request for an already-derived key
    ///
    /// # Arguments
    /// * `key` - Identity key
    /// * `profile` - Profile the request is charged to
    /// * `overrides` - Per-call adjustments merged over the registered profile
    /// * `outcome` - Outcome of the guarded operation, for skip policies
    ///
    /// # Returns
    /// A `RateLimitResult` indicating if the request is allowed. Store
    /// failures admit the request; only invalid arguments are errors.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        profile: ProfileName,
        overrides: Option<&RateLimitOverride>,
        outcome: Option<RequestOutcome>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let effective = self.registry.resolve(profile, overrides)?;

        if !self.config.enabled {
            return Ok(RateLimitResult::unlimited());
        }

        Ok(self.limiter.check(key, profile, &effective, outcome).await)
    }

    /// Check rate limit for a client IP address
    pub async fn check_by_ip(
        &self,
        ip: &str,
        profile: ProfileName,
        overrides: Option<&RateLimitOverride>,
        outcome: Option<RequestOutcome>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let key = RateLimitKey::for_ip(ip)?;
        self.check(&key, profile, overrides, outcome).await
    }

    /// Check rate limit for an authenticated user
    pub async fn check_by_user(
        &self,
        user_id: &str,
        profile: ProfileName,
        overrides: Option<&RateLimitOverride>,
        outcome: Option<RequestOutcome>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let key = RateLimitKey::for_user(user_id)?;
        self.check(&key, profile, overrides, outcome).await
    }

    /// Check both the IP and the user, returning the most restrictive result
    ///
    /// Both sub-checks count the request and run concurrently. Rotating IPs
    /// does not escape a user block, and rotating accounts does not escape an
    /// IP block.
    pub async fn check_by_ip_and_user(
        &self,
        ip: &str,
        user_id: &str,
        profile: ProfileName,
        overrides: Option<&RateLimitOverride>,
        outcome: Option<RequestOutcome>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let ip_key = RateLimitKey::for_ip(ip)?;
        let user_key = RateLimitKey::for_user(user_id)?;

        let (ip_result, user_result) = tokio::join!(
            self.check(&ip_key, profile, overrides, outcome),
            self.check(&user_key, profile, overrides, outcome),
        );

        let combined = RateLimitResult::most_restrictive(&ip_result?, &user_result?);
        debug!(
            ip_key = %ip_key,
            user_key = %user_key,
            profile = %profile,
            allowed = combined.allowed,
            "Combined rate limit check completed"
        );
        Ok(combined)
    }

    /// Clear window and block state for a key under every profile
    ///
    /// Returns true when the deletions succeeded, including when nothing existed.
    pub async fn reset(&self, key: &RateLimitKey) -> bool {
        self.clear(key, &ProfileName::ALL).await
    }

    /// Clear window and block state for a key under one profile
    pub async fn reset_profile(&self, key: &RateLimitKey, profile: ProfileName) -> bool {
        self.clear(key, &[profile]).await
    }

    async fn clear(&self, key: &RateLimitKey, profiles: &[ProfileName]) -> bool {
        match self.limiter.clear(key, profiles).await {
            Ok(removed) => {
                info!(key = %key, removed, "Rate limit state reset");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to reset rate limit state");
                false
            }
        }
    }

    /// Get current rate limit status without consuming quota
    pub async fn status(
        &self,
        key: &RateLimitKey,
        profile: ProfileName,
    ) -> Result<RateLimitStatus, RateLimitError> {
        let effective = self.registry.resolve(profile, None)?;
        Ok(self.limiter.status(key, profile, &effective).await?)
    }

    /// Sample the limiter keyspace
    pub async fn stats(&self) -> Result<RateLimitStats, RateLimitError> {
        Ok(self.maintenance.stats().await?)
    }

    /// Delete expired block markers and empty windows
    pub async fn cleanup(&self) -> Result<CleanupReport, RateLimitError> {
        Ok(self.maintenance.cleanup().await?)
    }

    /// Probe the storage backend
    pub async fn health(&self) -> StoreHealth {
        let started = Instant::now();
        let probe = with_timeout(self.config.command_timeout(), self.storage.ping()).await;

        let (reachable, latency_ms, error) = match probe {
            Ok(()) => (true, Some(started.elapsed().as_millis() as u64), None),
            Err(e) => (false, None, Some(e.to_string())),
        };

        StoreHealth {
            backend: self.storage.backend_name().to_string(),
            reachable,
            latency_ms,
            atomic_script: self.limiter.is_atomic(),
            error,
        }
    }

    /// Start the periodic maintenance task
    ///
    /// Every `cleanup_interval_seconds` the task runs `cleanup()` and logs a
    /// `stats()` summary. It stops when `token` is cancelled.
    pub fn start_maintenance_task(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let cleanup_interval = Duration::from_secs(self.config.cleanup_interval_seconds);

        tokio::spawn(async move {
            let mut interval = interval(cleanup_interval);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Rate limiter maintenance task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.run_maintenance().await;
                    }
                }
            }
        })
    }

    async fn run_maintenance(&self) {
        if let Err(e) = self.cleanup().await {
            warn!(error = %e, "Rate limiter cleanup failed");
        }

        match self.stats().await {
            Ok(stats) => info!(
                active_windows = stats.active_windows,
                blocked_keys = stats.blocked_keys,
                total_requests = stats.total_requests,
                truncated = stats.truncated,
                "Rate limiter stats"
            ),
            Err(e) => warn!(error = %e, "Rate limiter stats sampling failed"),
        }
    }

    /// Profiles in effect
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
