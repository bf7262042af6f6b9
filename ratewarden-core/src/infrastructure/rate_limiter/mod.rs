//! Rate Limiting Infrastructure
//!
//! This module provides the sliding window rate limiting system with:
//! - Sliding window log admission with temporary blocking per named profile
//! - Atomic server-side admission with a bounded non-atomic fallback
//! - Fail-open behavior when the store is slow or unreachable
//! - Dragonfly/Redis storage for distributed rate limiting, in-memory for single instances

pub mod maintenance;
pub mod service;
pub mod sliding_window;
pub mod storage;
pub mod types;

pub use maintenance::{MaintenanceSettings, RateLimitMaintenance};
pub use service::RateLimiterService;
pub use sliding_window::SlidingWindowLimiter;
pub use storage::{
    DragonflyRateLimitStorage, InMemoryRateLimitStorage, RateLimitStorage, StorageError,
};
pub use types::{CleanupReport, RateLimitResult, RateLimitStats, RateLimitStatus, StoreHealth};
