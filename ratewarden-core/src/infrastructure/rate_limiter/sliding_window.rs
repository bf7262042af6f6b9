//! Sliding Window Log Rate Limiter
//!
//! Implements the sliding window log algorithm with temporary blocking.
//! Every counted request leaves one timestamped entry in a sorted set; a
//! request is admitted while fewer than `max_requests` entries fall inside the
//! trailing window. Exceeding the limit either soft-denies (the window slides
//! and admits again) or writes a block marker that denies everything until it
//! expires.
//!
//! Admission runs through the store's atomic path when available. Otherwise
//! the individual commands are issued in sequence; two callers racing at
//! `max_requests - 1` can then both be admitted, so the overshoot is bounded
//! by one extra request per concurrent racer.
//!
//! Every store call is bounded by a timeout. Any store failure fails open.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::storage::{RateLimitStorage, StorageError, with_timeout};
use super::types::{
    AdmitDecision, AdmitRequest, RateLimitResult, RateLimitStatus, current_time_millis,
};
use crate::domain::rate_limit::{ProfileName, RateLimitKey, RateLimitProfile, RequestOutcome};

/// Sliding window limiter over a shared storage backend
pub struct SlidingWindowLimiter {
    storage: Arc<dyn RateLimitStorage>,
    key_prefix: String,
    command_timeout: Duration,
    /// Cleared once the store rejects the atomic path
    atomic_available: AtomicBool,
}

impl SlidingWindowLimiter {
    /// Create a new sliding window limiter
    pub fn new(
        storage: Arc<dyn RateLimitStorage>,
        key_prefix: &str,
        command_timeout: Duration,
        use_atomic: bool,
    ) -> Self {
        Self {
            storage,
            key_prefix: key_prefix.to_string(),
            command_timeout,
            atomic_available: AtomicBool::new(use_atomic),
        }
    }

    /// Whether admission currently runs through the atomic path
    pub fn is_atomic(&self) -> bool {
        self.atomic_available.load(Ordering::Relaxed)
    }

    /// Check and count one request
    ///
    /// # Arguments
    /// * `key` - Identity key
    /// * `name` - Profile the request is charged to
    /// * `profile` - Effective parameters (registry entry merged with any override)
    /// * `outcome` - Outcome of the guarded operation, if already known
    ///
    /// # Returns
    /// The admission decision. Never fails: store errors admit the request.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        name: ProfileName,
        profile: &RateLimitProfile,
        outcome: Option<RequestOutcome>,
    ) -> RateLimitResult {
        let now = current_time_millis();

        match self.try_check(key, name, profile, outcome, now).await {
            Ok(result) => {
                debug!(
                    key = %key,
                    profile = %name,
                    allowed = result.allowed,
                    remaining = result.remaining,
                    total_hits = result.total_hits,
                    "Rate limit check completed"
                );
                result
            }
            Err(e) => {
                warn!(
                    key = %key,
                    profile = %name,
                    backend = self.storage.backend_name(),
                    error = %e,
                    "Rate limit store unavailable, failing open"
                );
                Self::fail_open(profile, now)
            }
        }
    }

    async fn try_check(
        &self,
        key: &RateLimitKey,
        name: ProfileName,
        profile: &RateLimitProfile,
        outcome: Option<RequestOutcome>,
        now: u64,
    ) -> Result<RateLimitResult, StorageError> {
        let window_key = key.window_key(&self.key_prefix, name);
        let block_key = key.block_key(&self.key_prefix, name);
        let window_start = now.saturating_sub(profile.window_ms);
        let reset_time = now.saturating_add(profile.window_ms);

        if let Some(blocked_until) = self.bounded(self.storage.get_block(&block_key)).await?
            && blocked_until > now
        {
            debug!(key = %key, profile = %name, blocked_until, "Request denied by active block");
            return Ok(RateLimitResult::blocked(
                blocked_until,
                profile.max_requests,
                now,
            ));
        }

        if Self::should_skip(profile, outcome) {
            let count = self
                .bounded(self.storage.count_window_since(&window_key, window_start))
                .await?;
            let count = clamp_u32(count);
            return Ok(RateLimitResult::allowed(
                profile.max_requests.saturating_sub(count),
                reset_time,
                count,
            ));
        }

        let member = format!("{}-{}", now, Uuid::new_v4().simple());

        if self.is_atomic() {
            let request = AdmitRequest {
                window_key: &window_key,
                block_key: &block_key,
                now,
                window_start,
                max_requests: profile.max_requests,
                block_duration_ms: profile.block_duration_ms,
                member: &member,
                window_ttl_secs: profile.window_ttl_secs(),
                block_ttl_secs: profile.block_ttl_secs(),
            };

            match self.bounded(self.storage.admit(&request)).await {
                Ok(decision) => {
                    return Ok(Self::decision_to_result(decision, profile, now, reset_time));
                }
                Err(StorageError::ScriptUnsupported(reason)) => {
                    self.atomic_available.store(false, Ordering::Relaxed);
                    warn!(
                        backend = self.storage.backend_name(),
                        reason = %reason,
                        "Atomic admission unavailable, using non-atomic fallback"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.bounded(self.storage.prune_window(&window_key, window_start))
            .await?;
        let count = self
            .bounded(self.storage.count_window(&window_key))
            .await?;

        let decision = if count >= u64::from(profile.max_requests) {
            if profile.blocks_on_exceed() {
                let blocked_until = now.saturating_add(profile.block_duration_ms);
                self.bounded(self.storage.set_block(
                    &block_key,
                    blocked_until,
                    profile.block_ttl_secs(),
                ))
                .await?;
                AdmitDecision::BlockCreated {
                    blocked_until,
                    count,
                }
            } else {
                AdmitDecision::Limited { count }
            }
        } else {
            self.bounded(self.storage.record_hit(
                &window_key,
                now,
                &member,
                profile.window_ttl_secs(),
            ))
            .await?;
            AdmitDecision::Admitted { count }
        };

        Ok(Self::decision_to_result(decision, profile, now, reset_time))
    }

    /// Current quota for a key without consuming or pruning anything
    pub async fn status(
        &self,
        key: &RateLimitKey,
        name: ProfileName,
        profile: &RateLimitProfile,
    ) -> Result<RateLimitStatus, StorageError> {
        let now = current_time_millis();
        let window_start = now.saturating_sub(profile.window_ms);

        let block_key = key.block_key(&self.key_prefix, name);
        if let Some(blocked_until) = self.bounded(self.storage.get_block(&block_key)).await?
            && blocked_until > now
        {
            return Ok(RateLimitResult::blocked(blocked_until, profile.max_requests, now).into_status());
        }

        let window_key = key.window_key(&self.key_prefix, name);
        let count = clamp_u32(
            self.bounded(self.storage.count_window_since(&window_key, window_start))
                .await?,
        );

        Ok(RateLimitStatus {
            remaining: profile.max_requests.saturating_sub(count),
            reset_time: now.saturating_add(profile.window_ms),
            total_hits: count,
            retry_after: None,
        })
    }

    /// Delete window and block state for a key under the given profiles
    ///
    /// Returns how many keys existed.
    pub async fn clear(
        &self,
        key: &RateLimitKey,
        profiles: &[ProfileName],
    ) -> Result<u64, StorageError> {
        let keys: Vec<String> = profiles
            .iter()
            .flat_map(|p| {
                [
                    key.window_key(&self.key_prefix, *p),
                    key.block_key(&self.key_prefix, *p),
                ]
            })
            .collect();

        let removed = self.bounded(self.storage.delete(&keys)).await?;
        debug!(key = %key, removed, "Cleared rate limit state");
        Ok(removed)
    }

    /// Run a store call under the command timeout
    pub(crate) async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        with_timeout(self.command_timeout, operation).await
    }

    fn should_skip(profile: &RateLimitProfile, outcome: Option<RequestOutcome>) -> bool {
        match outcome {
            Some(RequestOutcome::Succeeded) => profile.skip_successful_requests,
            Some(RequestOutcome::Failed) => profile.skip_failed_requests,
            None => false,
        }
    }

    fn decision_to_result(
        decision: AdmitDecision,
        profile: &RateLimitProfile,
        now: u64,
        reset_time: u64,
    ) -> RateLimitResult {
        match decision {
            AdmitDecision::Admitted { count } => {
                let count = clamp_u32(count);
                let hits = count.saturating_add(1);
                RateLimitResult::allowed(profile.max_requests.saturating_sub(hits), reset_time, hits)
            }
            AdmitDecision::Limited { count } => {
                RateLimitResult::limited(reset_time, clamp_u32(count))
            }
            AdmitDecision::BlockCreated {
                blocked_until,
                count,
            } => RateLimitResult::blocked(blocked_until, clamp_u32(count), now),
            AdmitDecision::AlreadyBlocked { blocked_until } => {
                RateLimitResult::blocked(blocked_until, profile.max_requests, now)
            }
        }
    }

    fn fail_open(profile: &RateLimitProfile, now: u64) -> RateLimitResult {
        RateLimitResult::allowed(
            profile.max_requests.saturating_sub(1),
            now.saturating_add(profile.window_ms),
            1,
        )
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rate_limiter::storage::InMemoryRateLimitStorage;

    fn limiter(use_atomic: bool) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(
            Arc::new(InMemoryRateLimitStorage::new()),
            "test",
            Duration::from_millis(500),
            use_atomic,
        )
    }

    fn ip(addr: &str) -> RateLimitKey {
        RateLimitKey::for_ip(addr).unwrap()
    }

    #[test]
    fn test_should_skip() {
        let mut profile = RateLimitProfile::new(1_000, 1, 0);
        assert!(!SlidingWindowLimiter::should_skip(&profile, None));

        profile.skip_successful_requests = true;
        assert!(SlidingWindowLimiter::should_skip(
            &profile,
            Some(RequestOutcome::Succeeded)
        ));
        assert!(!SlidingWindowLimiter::should_skip(
            &profile,
            Some(RequestOutcome::Failed)
        ));
    }

    #[test]
    fn test_fail_open_result() {
        let profile = RateLimitProfile::new(60_000, 10, 0);
        let result = SlidingWindowLimiter::fail_open(&profile, 1_000);
        assert!(result.allowed);
        assert_eq!(result.remaining, 9);
        assert_eq!(result.reset_time, 61_000);
    }

    #[tokio::test]
    async fn test_last_admitted_request_has_zero_remaining() {
        for atomic in [true, false] {
            let limiter = limiter(atomic);
            let profile = RateLimitProfile::new(60_000, 3, 0);
            let key = ip("10.0.0.1");

            let mut last = None;
            for _ in 0..3 {
                last = Some(limiter.check(&key, ProfileName::General, &profile, None).await);
            }
            let last = last.unwrap();
            assert!(last.allowed);
            assert_eq!(last.remaining, 0);
            assert_eq!(last.total_hits, 3);

            let denied = limiter.check(&key, ProfileName::General, &profile, None).await;
            assert!(!denied.allowed);
            assert!(denied.retry_after.is_none());
        }
    }

    #[tokio::test]
    async fn test_extreme_durations_saturate() {
        for atomic in [true, false] {
            let limiter = limiter(atomic);
            let profile = RateLimitProfile::new(u64::MAX, 1, u64::MAX);
            let key = ip("10.0.0.9");

            let first = limiter.check(&key, ProfileName::General, &profile, None).await;
            assert!(first.allowed);
            assert_eq!(first.reset_time, u64::MAX);

            let second = limiter.check(&key, ProfileName::General, &profile, None).await;
            assert!(!second.allowed);
            assert!(second.retry_after.is_some());

            // The block is still in force
            let third = limiter.check(&key, ProfileName::General, &profile, None).await;
            assert!(!third.allowed);
        }
    }

    #[tokio::test]
    async fn test_status_does_not_consume() {
        let limiter = limiter(true);
        let profile = RateLimitProfile::new(60_000, 5, 0);
        let key = ip("10.0.0.2");

        limiter.check(&key, ProfileName::General, &profile, None).await;
        for _ in 0..3 {
            let status = limiter
                .status(&key, ProfileName::General, &profile)
                .await
                .unwrap();
            assert_eq!(status.remaining, 4);
            assert_eq!(status.total_hits, 1);
        }
    }

    #[tokio::test]
    async fn test_clear_removes_block() {
        let limiter = limiter(false);
        let profile = RateLimitProfile::new(60_000, 1, 60_000);
        let key = ip("10.0.0.3");

        limiter.check(&key, ProfileName::Auth, &profile, None).await;
        let blocked = limiter.check(&key, ProfileName::Auth, &profile, None).await;
        assert!(blocked.retry_after.is_some());

        let removed = limiter.clear(&key, &[ProfileName::Auth]).await.unwrap();
        assert_eq!(removed, 2);

        let fresh = limiter.check(&key, ProfileName::Auth, &profile, None).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.total_hits, 1);
    }
}
