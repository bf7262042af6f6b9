//! Rate limiter types and core data structures

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::domain::rate_limit::profile::ceil_secs;

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Unix timestamp (milliseconds) when the window resets or the block ends
    pub reset_time: u64,
    /// Requests counted in the current window, including this one when admitted
    pub total_hits: u32,
    /// Seconds to wait before retrying (only set while a block is active)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    /// Create an admitted result
    pub fn allowed(remaining: u32, reset_time: u64, total_hits: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_time,
            total_hits,
            retry_after: None,
        }
    }

    /// Create a result for an identity with an active block marker
    pub fn blocked(blocked_until: u64, total_hits: u32, now: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_time: blocked_until,
            total_hits,
            retry_after: Some(retry_after_secs(blocked_until, now)),
        }
    }

    /// Create a soft-deny result that clears as the window slides
    pub fn limited(reset_time: u64, total_hits: u32) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_time,
            total_hits,
            retry_after: None,
        }
    }

    /// Result returned when rate limiting is switched off
    pub fn unlimited() -> Self {
        Self::allowed(u32::MAX, 0, 0)
    }

    /// Combine two independent checks into the most restrictive outcome
    pub fn most_restrictive(a: &Self, b: &Self) -> Self {
        let retry_after = match (a.retry_after, b.retry_after) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        };

        Self {
            allowed: a.allowed && b.allowed,
            remaining: a.remaining.min(b.remaining),
            reset_time: a.reset_time.max(b.reset_time),
            total_hits: a.total_hits.max(b.total_hits),
            retry_after,
        }
    }

    /// Conventional response headers for the HTTP layer
    pub fn headers(&self, limit: u32) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", ceil_secs(self.reset_time).to_string()),
        ];
        if let Some(retry_after) = self.retry_after {
            headers.push(("Retry-After", retry_after.to_string()));
        }
        headers
    }

    /// Drop the admission flag, keeping the quota view
    pub fn into_status(self) -> RateLimitStatus {
        RateLimitStatus {
            remaining: self.remaining,
            reset_time: self.reset_time,
            total_hits: self.total_hits,
            retry_after: self.retry_after,
        }
    }
}

/// Quota view returned by `status`; never consumes quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub reset_time: u64,
    pub total_hits: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl RateLimitStatus {
    pub fn is_blocked(&self) -> bool {
        self.retry_after.is_some()
    }
}

/// Sampled view of the limiter's keyspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    /// Window collections seen in the sample
    pub active_windows: u64,
    /// Block markers still in force
    pub blocked_keys: u64,
    /// Best-effort sum of entries across the sampled windows
    pub total_requests: u64,
    /// Keys inspected
    pub sampled_keys: u64,
    /// The sample hit its cap before the keyspace was exhausted
    pub truncated: bool,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Keys deleted by this pass
    pub cleaned_keys: u64,
    /// Keys inspected
    pub scanned_keys: u64,
    /// Batches processed
    pub batches: u64,
    /// The pass stopped at its cap before the keyspace was exhausted
    pub truncated: bool,
}

/// Store diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    /// Backend name (`dragonfly` or `memory`)
    pub backend: String,
    pub reachable: bool,
    /// Round-trip latency of the probe, when it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Whether admission runs through the atomic server-side script
    pub atomic_script: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decision taken atomically by the store for one counted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// Entry recorded; `count` is the number of entries before this one
    Admitted { count: u64 },
    /// Limit reached with no blocking configured
    Limited { count: u64 },
    /// Limit reached and a block marker was written
    BlockCreated { blocked_until: u64, count: u64 },
    /// An existing block marker is still in force
    AlreadyBlocked { blocked_until: u64 },
}

/// Arguments for an atomic admission attempt
#[derive(Debug, Clone)]
pub struct AdmitRequest<'a> {
    pub window_key: &'a str,
    pub block_key: &'a str,
    pub now: u64,
    pub window_start: u64,
    pub max_requests: u32,
    pub block_duration_ms: u64,
    pub member: &'a str,
    pub window_ttl_secs: u64,
    pub block_ttl_secs: u64,
}

/// Seconds until `until`, rounded up so callers never under-wait
pub fn retry_after_secs(until: u64, now: u64) -> u64 {
    ceil_secs(until.saturating_sub(now))
}

/// Get current time in milliseconds since Unix epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_result_rounds_retry_after_up() {
        let result = RateLimitResult::blocked(10_001, 3, 0);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.retry_after, Some(11));
    }

    #[test]
    fn test_limited_result_has_no_retry_after() {
        let result = RateLimitResult::limited(5_000, 10);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert!(result.retry_after.is_none());
    }

    #[test]
    fn test_most_restrictive() {
        let ip = RateLimitResult::allowed(5, 1_000, 5);
        let user = RateLimitResult::blocked(9_000, 10, 1_000);

        let combined = RateLimitResult::most_restrictive(&ip, &user);
        assert!(!combined.allowed);
        assert_eq!(combined.remaining, 0);
        assert_eq!(combined.reset_time, 9_000);
        assert_eq!(combined.total_hits, 10);
        assert_eq!(combined.retry_after, Some(8));
    }

    #[test]
    fn test_most_restrictive_takes_longer_block() {
        let a = RateLimitResult::blocked(5_000, 1, 0);
        let b = RateLimitResult::blocked(30_000, 1, 0);
        let combined = RateLimitResult::most_restrictive(&a, &b);
        assert_eq!(combined.retry_after, Some(30));
    }

    #[test]
    fn test_headers() {
        let result = RateLimitResult::blocked(61_000, 10, 1_000);
        let headers = result.headers(10);
        assert!(headers.contains(&("X-RateLimit-Remaining", "0".to_string())));
        assert!(headers.contains(&("Retry-After", "60".to_string())));

        let allowed = RateLimitResult::allowed(3, 60_000, 7);
        assert!(!allowed.headers(10).iter().any(|(name, _)| *name == "Retry-After"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let json = serde_json::to_value(RateLimitResult::allowed(1, 2, 3)).unwrap();
        assert_eq!(json["resetTime"], 2);
        assert_eq!(json["totalHits"], 3);
        assert!(json.get("retryAfter").is_none());
    }
}
