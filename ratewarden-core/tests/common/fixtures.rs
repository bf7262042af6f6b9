//! Test fixtures for ratewarden-core

use std::sync::Arc;

use ratewarden_core::config::{RateLimitConfig, RateLimitStorageBackend};
use ratewarden_core::domain::rate_limit::{RateLimitKey, RateLimitOverride};
use ratewarden_core::infrastructure::rate_limiter::{
    InMemoryRateLimitStorage, RateLimitStorage, RateLimiterService,
};

/// Rate limit config backed by memory with fast maintenance settings
pub fn test_config() -> RateLimitConfig {
    RateLimitConfig {
        enabled: true,
        storage_backend: RateLimitStorageBackend::Memory,
        key_prefix: "test".to_string(),
        command_timeout_ms: 500,
        cleanup_interval_seconds: 1,
        cleanup_batch_size: 10,
        cleanup_batch_pause_ms: 1,
        ..RateLimitConfig::default()
    }
}

/// Service over a fresh in-memory store
pub fn memory_service() -> RateLimiterService {
    service_with(Arc::new(InMemoryRateLimitStorage::new()), test_config())
}

/// Service over the given store
pub fn service_with(storage: Arc<dyn RateLimitStorage>, config: RateLimitConfig) -> RateLimiterService {
    RateLimiterService::with_storage(storage, config).expect("Invalid test configuration")
}

/// Per-call profile adjustment
pub fn window(window_ms: u64, max_requests: u32, block_duration_ms: u64) -> RateLimitOverride {
    RateLimitOverride::default()
        .with_window_ms(window_ms)
        .with_max_requests(max_requests)
        .with_block_duration_ms(block_duration_ms)
}

pub fn ip_key(ip: &str) -> RateLimitKey {
    RateLimitKey::for_ip(ip).expect("Invalid IP key")
}

pub fn user_key(user_id: &str) -> RateLimitKey {
    RateLimitKey::for_user(user_id).expect("Invalid user key")
}
