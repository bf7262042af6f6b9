//! Rate limiter maintenance: keyspace sampling and stale-key cleanup
//!
//! Both passes walk the limiter namespaces with cursor-based SCAN and are
//! capped, so a very large keyspace yields a partial (`truncated`) report
//! instead of an unbounded scan. Cleanup only deletes block markers whose
//! expiry has passed and window collections that are already empty, which
//! keeps it safe to run alongside live traffic. Entries past their TTL are
//! purged first, for stores without native key expiry.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::storage::{RateLimitStorage, StorageError, with_timeout};
use super::types::{CleanupReport, RateLimitStats, current_time_millis};

/// Limits applied to maintenance passes
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSettings {
    /// Keys requested per SCAN call and deleted per batch
    pub batch_size: usize,
    /// Pause between cleanup batches
    pub batch_pause: Duration,
    /// Maximum keys inspected by one cleanup pass
    pub max_cleanup_keys: u64,
    /// Maximum keys inspected by one stats sample
    pub stats_sample_limit: u64,
    /// Timeout applied to every store call
    pub command_timeout: Duration,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_pause: Duration::from_millis(10),
            max_cleanup_keys: 10_000,
            stats_sample_limit: 1_000,
            command_timeout: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Requests,
    Block,
}

impl Namespace {
    fn segment(&self) -> &'static str {
        match self {
            Namespace::Requests => "requests",
            Namespace::Block => "block",
        }
    }
}

/// Stats and cleanup jobs over the limiter's key namespaces
pub struct RateLimitMaintenance {
    storage: Arc<dyn RateLimitStorage>,
    key_prefix: String,
    settings: MaintenanceSettings,
}

impl RateLimitMaintenance {
    pub fn new(
        storage: Arc<dyn RateLimitStorage>,
        key_prefix: &str,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            storage,
            key_prefix: key_prefix.to_string(),
            settings,
        }
    }

    fn pattern(&self, namespace: Namespace) -> String {
        format!("{}:{}:*", self.key_prefix, namespace.segment())
    }

    async fn bounded<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        with_timeout(self.settings.command_timeout, operation).await
    }

    /// Sample the keyspace for diagnostics
    ///
    /// Per-key read failures are skipped; the sum of hits is best effort.
    pub async fn stats(&self) -> Result<RateLimitStats, StorageError> {
        let mut stats = RateLimitStats::default();
        let limit = self.settings.stats_sample_limit;
        let now = current_time_millis();

        'namespaces: for namespace in [Namespace::Requests, Namespace::Block] {
            let pattern = self.pattern(namespace);
            let mut cursor = 0;

            loop {
                let (next, keys) = self
                    .bounded(self.storage.scan(&pattern, cursor, self.settings.batch_size))
                    .await?;

                for key in keys {
                    if stats.sampled_keys >= limit {
                        stats.truncated = true;
                        break 'namespaces;
                    }
                    stats.sampled_keys += 1;

                    match namespace {
                        Namespace::Requests => {
                            match self.bounded(self.storage.count_window(&key)).await {
                                Ok(0) => {}
                                Ok(count) => {
                                    stats.active_windows += 1;
                                    stats.total_requests += count;
                                }
                                Err(e) => debug!(key = %key, error = %e, "Skipping window in stats sample"),
                            }
                        }
                        Namespace::Block => {
                            match self.bounded(self.storage.get_block(&key)).await {
                                Ok(Some(until)) if until > now => stats.blocked_keys += 1,
                                Ok(_) => {}
                                Err(e) => debug!(key = %key, error = %e, "Skipping block in stats sample"),
                            }
                        }
                    }
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }

        debug!(
            active_windows = stats.active_windows,
            blocked_keys = stats.blocked_keys,
            total_requests = stats.total_requests,
            sampled_keys = stats.sampled_keys,
            truncated = stats.truncated,
            "Rate limit stats sampled"
        );
        Ok(stats)
    }

    /// Delete expired block markers and empty window collections
    pub async fn cleanup(&self) -> Result<CleanupReport, StorageError> {
        let mut report = CleanupReport::default();
        report.cleaned_keys += self.bounded(self.storage.purge_expired()).await?;
        let now = current_time_millis();

        'namespaces: for namespace in [Namespace::Block, Namespace::Requests] {
            let pattern = self.pattern(namespace);
            let mut cursor = 0;

            loop {
                let (next, keys) = self
                    .bounded(self.storage.scan(&pattern, cursor, self.settings.batch_size))
                    .await?;
                report.batches += 1;

                let mut stale = Vec::new();
                let mut capped = false;
                for key in keys {
                    if report.scanned_keys >= self.settings.max_cleanup_keys {
                        capped = true;
                        break;
                    }
                    report.scanned_keys += 1;

                    let expired = match namespace {
                        Namespace::Block => matches!(
                            self.bounded(self.storage.get_block(&key)).await,
                            Ok(Some(until)) if until <= now
                        ),
                        Namespace::Requests => {
                            matches!(self.bounded(self.storage.count_window(&key)).await, Ok(0))
                        }
                    };
                    if expired {
                        stale.push(key);
                    }
                }

                if !stale.is_empty() {
                    report.cleaned_keys += self.bounded(self.storage.delete(&stale)).await?;
                }

                if capped {
                    report.truncated = true;
                    break 'namespaces;
                }
                if next == 0 {
                    break;
                }
                cursor = next;

                // Let live traffic through between batches
                tokio::time::sleep(self.settings.batch_pause).await;
            }
        }

        info!(
            cleaned_keys = report.cleaned_keys,
            scanned_keys = report.scanned_keys,
            batches = report.batches,
            truncated = report.truncated,
            "Rate limit cleanup completed"
        );
        Ok(report)
    }
}
