//! Rate Limit Storage Backends
//!
//! Provides storage implementations for sliding-window state:
//! - Dragonfly/Redis for distributed, production use
//! - In-memory for development and single-instance deployments
//!
//! Window entries live in a sorted set scored by request time (epoch ms).
//! Block markers are plain scalars holding the epoch-ms block expiry.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{AdmitDecision, AdmitRequest, current_time_millis};
use crate::domain::rate_limit::RateLimitError;

/// Errors raised by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Atomic admission unavailable: {0}")]
    ScriptUnsupported(String),
}

impl From<StorageError> for RateLimitError {
    fn from(err: StorageError) -> Self {
        RateLimitError::store_unavailable(err.to_string())
    }
}

/// Run a storage operation under a deadline; expiry is reported as `StorageError::Timeout`
pub async fn with_timeout<T>(
    timeout: Duration,
    operation: impl std::future::Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

fn command_error(command: &'static str) -> impl Fn(redis::RedisError) -> StorageError {
    move |e| StorageError::Command {
        command,
        message: e.to_string(),
    }
}

/// Trait for rate limit storage backends
#[async_trait]
pub trait RateLimitStorage: Send + Sync {
    /// Backend name for logs and diagnostics
    fn backend_name(&self) -> &'static str;

    /// Get the block marker (epoch ms) stored at `key`
    async fn get_block(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Set a block marker with TTL
    async fn set_block(&self, key: &str, until: u64, ttl_secs: u64) -> Result<(), StorageError>;

    /// Remove window entries scored strictly below `before`; returns how many were removed
    async fn prune_window(&self, key: &str, before: u64) -> Result<u64, StorageError>;

    /// Number of entries in the window collection
    async fn count_window(&self, key: &str) -> Result<u64, StorageError>;

    /// Number of entries scored at or after `since`, without modifying the collection
    async fn count_window_since(&self, key: &str, since: u64) -> Result<u64, StorageError>;

    /// Add a window entry and refresh the collection TTL
    async fn record_hit(
        &self,
        key: &str,
        score: u64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<(), StorageError>;

    /// Run block check, prune, count and record as one atomic step
    ///
    /// Backends that cannot do this return `StorageError::ScriptUnsupported`
    /// and the limiter falls back to the individual commands above.
    async fn admit(&self, request: &AdmitRequest<'_>) -> Result<AdmitDecision, StorageError> {
        let _ = request;
        Err(StorageError::ScriptUnsupported(format!(
            "{} backend has no atomic admission",
            self.backend_name()
        )))
    }

    /// Delete keys; returns how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64, StorageError>;

    /// Drop entries whose TTL has passed; returns how many were dropped
    ///
    /// Stores that expire keys natively have nothing to do here.
    async fn purge_expired(&self) -> Result<u64, StorageError> {
        Ok(0)
    }

    /// Incrementally iterate keys matching a glob pattern
    ///
    /// Returns the next cursor (0 when iteration is complete) and a batch of keys.
    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError>;

    /// Liveness probe
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Server-side admission script: block check, prune, count and record in one step
///
/// Returns `{code, blocked_until, count}` where code is
/// 0 = admitted, 1 = limited, 2 = block created, 3 = already blocked.
const ADMIT_SCRIPT: &str = r#"
local window_key = KEYS[1]
local block_key = KEYS[2]
local now = tonumber(ARGV[1])
local window_start = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local block_ms = tonumber(ARGV[4])
local member = ARGV[5]
local window_ttl = tonumber(ARGV[6])
local block_ttl = tonumber(ARGV[7])

local blocked_until = tonumber(redis.call('GET', block_key) or '0') or 0
if blocked_until > now then
    return {3, blocked_until, 0}
end

redis.call('ZREMRANGEBYSCORE', window_key, '-inf', '(' .. window_start)
local count = redis.call('ZCARD', window_key)

if count >= max_requests then
    if block_ms > 0 then
        local until_ms = now + block_ms
        redis.call('SET', block_key, until_ms, 'EX', block_ttl)
        return {2, until_ms, count}
    end
    return {1, 0, count}
end

redis.call('ZADD', window_key, now, member)
redis.call('EXPIRE', window_key, window_ttl)
return {0, 0, count}
"#;

/// Dragonfly/Redis storage backend
pub struct DragonflyRateLimitStorage {
    connection_manager: Arc<ConnectionManager>,
    admit_script: redis::Script,
}

impl DragonflyRateLimitStorage {
    /// Create a new Dragonfly storage backend
    ///
    /// Connecting and the initial ping are each bounded by `connect_timeout`.
    pub async fn new(url: &str, connect_timeout: Duration) -> Result<Self, StorageError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client for rate limiting: {}", e);
            StorageError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        // Reconnect backoff stays in the tens of milliseconds
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(2)
            .set_factor(10)
            .set_max_delay(100);
        let connection_manager = tokio::time::timeout(
            connect_timeout,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        .map_err(|_| {
            warn!(
                "Timed out connecting to Dragonfly for rate limiting after {:?}",
                connect_timeout
            );
            StorageError::Timeout(connect_timeout)
        })?
        .map_err(|e| {
            warn!(
                "Failed to create connection manager for rate limiting: {}",
                e
            );
            StorageError::Connection(format!("Failed to create connection manager: {}", e))
        })?;

        let storage = Self {
            connection_manager: Arc::new(connection_manager),
            admit_script: redis::Script::new(ADMIT_SCRIPT),
        };
        with_timeout(connect_timeout, storage.ping()).await?;

        debug!("Successfully connected to Dragonfly for rate limiting");
        Ok(storage)
    }

    fn conn(&self) -> ConnectionManager {
        (*self.connection_manager).clone()
    }

    /// Only a server without scripting disables the atomic path; script runtime errors do not
    fn classify_script_error(e: redis::RedisError) -> StorageError {
        let message = e.to_string();
        if e.kind() == redis::ErrorKind::NoScriptError
            || message.to_ascii_lowercase().contains("unknown command")
        {
            StorageError::ScriptUnsupported(message)
        } else {
            StorageError::Command {
                command: "EVALSHA",
                message,
            }
        }
    }
}

#[async_trait]
impl RateLimitStorage for DragonflyRateLimitStorage {
    fn backend_name(&self) -> &'static str {
        "dragonfly"
    }

    async fn get_block(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let mut conn = self.conn();

        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<u64>>(&mut conn)
            .await
            .map_err(command_error("GET"))
    }

    async fn set_block(&self, key: &str, until: u64, ttl_secs: u64) -> Result<(), StorageError> {
        let mut conn = self.conn();

        redis::cmd("SET")
            .arg(key)
            .arg(until)
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("SET"))
    }

    async fn prune_window(&self, key: &str, before: u64) -> Result<u64, StorageError> {
        let mut conn = self.conn();

        redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(format!("({}", before))
            .query_async::<u64>(&mut conn)
            .await
            .map_err(command_error("ZREMRANGEBYSCORE"))
    }

    async fn count_window(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.conn();

        redis::cmd("ZCARD")
            .arg(key)
            .query_async::<u64>(&mut conn)
            .await
            .map_err(command_error("ZCARD"))
    }

    async fn count_window_since(&self, key: &str, since: u64) -> Result<u64, StorageError> {
        let mut conn = self.conn();

        redis::cmd("ZCOUNT")
            .arg(key)
            .arg(since)
            .arg("+inf")
            .query_async::<u64>(&mut conn)
            .await
            .map_err(command_error("ZCOUNT"))
    }

    async fn record_hit(
        &self,
        key: &str,
        score: u64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn();

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs.max(1))
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("ZADD"))
    }

    async fn admit(&self, request: &AdmitRequest<'_>) -> Result<AdmitDecision, StorageError> {
        let mut conn = self.conn();

        let reply: Vec<u64> = self
            .admit_script
            .key(request.window_key)
            .key(request.block_key)
            .arg(request.now)
            .arg(request.window_start)
            .arg(request.max_requests)
            .arg(request.block_duration_ms)
            .arg(request.member)
            .arg(request.window_ttl_secs.max(1))
            .arg(request.block_ttl_secs.max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::classify_script_error)?;

        match reply.as_slice() {
            [0, _, count] => Ok(AdmitDecision::Admitted { count: *count }),
            [1, _, count] => Ok(AdmitDecision::Limited { count: *count }),
            [2, until, count] => Ok(AdmitDecision::BlockCreated {
                blocked_until: *until,
                count: *count,
            }),
            [3, until, _] => Ok(AdmitDecision::AlreadyBlocked {
                blocked_until: *until,
            }),
            other => Err(StorageError::Command {
                command: "EVALSHA",
                message: format!("unexpected admission reply: {:?}", other),
            }),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();

        redis::cmd("DEL")
            .arg(keys)
            .query_async::<u64>(&mut conn)
            .await
            .map_err(command_error("DEL"))
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let mut conn = self.conn();

        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async::<(u64, Vec<String>)>(&mut conn)
            .await
            .map_err(command_error("SCAN"))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn();

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Connection(format!("Failed to ping Redis: {}", e)))
    }
}

/// In-memory storage entry with expiration
#[derive(Clone)]
struct MemoryEntry<T: Clone> {
    value: T,
    /// Epoch ms
    expires_at: u64,
}

impl<T: Clone> MemoryEntry<T> {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

type WindowSet = BTreeSet<(u64, String)>;

/// In-memory storage backend for development/single instance
///
/// Admission is atomic within the process: `admit` holds both maps for the
/// whole decision.
pub struct InMemoryRateLimitStorage {
    windows: Arc<RwLock<HashMap<String, MemoryEntry<WindowSet>>>>,
    blocks: Arc<RwLock<HashMap<String, MemoryEntry<u64>>>>,
}

impl InMemoryRateLimitStorage {
    /// Create a new in-memory storage backend
    pub fn new() -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            blocks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn expiry(now: u64, ttl_secs: u64) -> u64 {
        now.saturating_add(ttl_secs.max(1).saturating_mul(1000))
    }

    /// Number of live keys held, across windows and block markers
    pub async fn key_count(&self) -> usize {
        let now = current_time_millis();
        let windows = self.windows.read().await;
        let blocks = self.blocks.read().await;
        windows.values().filter(|e| e.is_live(now)).count()
            + blocks.values().filter(|e| e.is_live(now)).count()
    }

    /// Entries held in memory, including expired ones not yet purged
    pub async fn held_entries(&self) -> usize {
        let windows = self.windows.read().await;
        let blocks = self.blocks.read().await;
        windows.len() + blocks.len()
    }
}

impl Default for InMemoryRateLimitStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStorage for InMemoryRateLimitStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_block(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let blocks = self.blocks.read().await;
        if let Some(entry) = blocks.get(key)
            && entry.is_live(current_time_millis())
        {
            return Ok(Some(entry.value));
        }
        Ok(None)
    }

    async fn set_block(&self, key: &str, until: u64, ttl_secs: u64) -> Result<(), StorageError> {
        let mut blocks = self.blocks.write().await;
        blocks.insert(
            key.to_string(),
            MemoryEntry {
                value: until,
                expires_at: Self::expiry(current_time_millis(), ttl_secs),
            },
        );
        Ok(())
    }

    async fn prune_window(&self, key: &str, before: u64) -> Result<u64, StorageError> {
        let mut windows = self.windows.write().await;
        let now = current_time_millis();
        match windows.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                let initial = entry.value.len();
                entry.value.retain(|(score, _)| *score >= before);
                Ok((initial - entry.value.len()) as u64)
            }
            _ => Ok(0),
        }
    }

    async fn count_window(&self, key: &str) -> Result<u64, StorageError> {
        let windows = self.windows.read().await;
        Ok(windows
            .get(key)
            .filter(|e| e.is_live(current_time_millis()))
            .map_or(0, |e| e.value.len() as u64))
    }

    async fn count_window_since(&self, key: &str, since: u64) -> Result<u64, StorageError> {
        let windows = self.windows.read().await;
        Ok(windows
            .get(key)
            .filter(|e| e.is_live(current_time_millis()))
            .map_or(0, |e| {
                e.value.iter().filter(|(score, _)| *score >= since).count() as u64
            }))
    }

    async fn record_hit(
        &self,
        key: &str,
        score: u64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<(), StorageError> {
        let mut windows = self.windows.write().await;
        let now = current_time_millis();
        let entry = windows.entry(key.to_string()).or_insert_with(|| MemoryEntry {
            value: WindowSet::new(),
            expires_at: 0,
        });
        if !entry.is_live(now) {
            entry.value.clear();
        }
        entry.value.insert((score, member.to_string()));
        entry.expires_at = Self::expiry(now, ttl_secs);
        Ok(())
    }

    async fn admit(&self, request: &AdmitRequest<'_>) -> Result<AdmitDecision, StorageError> {
        // Lock order: windows before blocks, everywhere
        let mut windows = self.windows.write().await;
        let mut blocks = self.blocks.write().await;
        let now = current_time_millis();

        if let Some(entry) = blocks.get(request.block_key)
            && entry.is_live(now)
            && entry.value > request.now
        {
            return Ok(AdmitDecision::AlreadyBlocked {
                blocked_until: entry.value,
            });
        }

        let entry = windows
            .entry(request.window_key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: WindowSet::new(),
                expires_at: 0,
            });
        if !entry.is_live(now) {
            entry.value.clear();
        }
        entry
            .value
            .retain(|(score, _)| *score >= request.window_start);
        let count = entry.value.len() as u64;

        if count >= u64::from(request.max_requests) {
            if request.block_duration_ms > 0 {
                let blocked_until = request.now.saturating_add(request.block_duration_ms);
                blocks.insert(
                    request.block_key.to_string(),
                    MemoryEntry {
                        value: blocked_until,
                        expires_at: Self::expiry(now, request.block_ttl_secs),
                    },
                );
                return Ok(AdmitDecision::BlockCreated {
                    blocked_until,
                    count,
                });
            }
            return Ok(AdmitDecision::Limited { count });
        }

        entry
            .value
            .insert((request.now, request.member.to_string()));
        entry.expires_at = Self::expiry(now, request.window_ttl_secs);
        Ok(AdmitDecision::Admitted { count })
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StorageError> {
        let mut windows = self.windows.write().await;
        let mut blocks = self.blocks.write().await;
        let now = current_time_millis();

        let mut removed = 0;
        for key in keys {
            if windows.remove(key).is_some_and(|e| e.is_live(now)) {
                removed += 1;
            }
            if blocks.remove(key).is_some_and(|e| e.is_live(now)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let mut windows = self.windows.write().await;
        let mut blocks = self.blocks.write().await;
        let now = current_time_millis();

        let before = windows.len() + blocks.len();
        windows.retain(|_, e| e.is_live(now));
        blocks.retain(|_, e| e.is_live(now));
        let purged = before - (windows.len() + blocks.len());

        if purged > 0 {
            debug!(purged, "Purged expired in-memory rate limit entries");
        }
        Ok(purged as u64)
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let windows = self.windows.read().await;
        let blocks = self.blocks.read().await;
        let now = current_time_millis();

        // Order by a stable hash so cursors survive deletions between calls
        let mut keys: Vec<(u64, &String)> = windows
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k)
            .chain(blocks.iter().filter(|(_, e)| e.is_live(now)).map(|(k, _)| k))
            .filter(|k| glob_matches(pattern, k))
            .map(|k| (scan_position(k), k))
            .filter(|(position, _)| *position >= cursor)
            .collect();
        keys.sort();

        let take = count.max(1);
        let batch: Vec<String> = keys.iter().take(take).map(|(_, k)| (*k).clone()).collect();
        let next = match keys.get(take) {
            Some(_) => keys[take - 1].0.saturating_add(1),
            None => 0,
        };

        Ok((next, batch))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn scan_position(key: &str) -> u64 {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Minimal glob matcher supporting `*` wildcards, as used by SCAN MATCH patterns
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = candidate.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    let Some((last, middle)) = remaining.split_last() else {
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admit_request<'a>(now: u64, max_requests: u32, block_ms: u64) -> AdmitRequest<'a> {
        AdmitRequest {
            window_key: "test:requests",
            block_key: "test:block",
            now,
            window_start: now.saturating_sub(60_000),
            max_requests,
            block_duration_ms: block_ms,
            member: "m",
            window_ttl_secs: 60,
            block_ttl_secs: 60,
        }
    }

    #[test]
    fn test_classify_script_error() {
        let server_error = |kind, detail: &str| {
            redis::RedisError::from((kind, "An error was signalled by the server", detail.to_string()))
        };

        let unsupported = server_error(
            redis::ErrorKind::ResponseError,
            "unknown command `EVALSHA`, with args beginning with: ",
        );
        assert!(matches!(
            DragonflyRateLimitStorage::classify_script_error(unsupported),
            StorageError::ScriptUnsupported(_)
        ));

        let missing = server_error(redis::ErrorKind::NoScriptError, "No matching script");
        assert!(matches!(
            DragonflyRateLimitStorage::classify_script_error(missing),
            StorageError::ScriptUnsupported(_)
        ));

        let runtime = server_error(
            redis::ErrorKind::ResponseError,
            "Error running script: user_script:12: Lua redis lib command arguments must be strings",
        );
        assert!(matches!(
            DragonflyRateLimitStorage::classify_script_error(runtime),
            StorageError::Command { .. }
        ));
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("rate_limit:requests:*", "rate_limit:requests:auth:ip:1"));
        assert!(!glob_matches("rate_limit:requests:*", "rate_limit:block:auth:ip:1"));
        assert!(glob_matches("a*c*e", "abcde"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exactly"));
    }

    #[tokio::test]
    async fn test_in_memory_block_marker() {
        let storage = InMemoryRateLimitStorage::new();

        assert!(storage.get_block("test:block").await.unwrap().is_none());

        storage
            .set_block("test:block", 1234567890, 60)
            .await
            .unwrap();

        let result = storage.get_block("test:block").await.unwrap();
        assert_eq!(result, Some(1234567890));
    }

    #[tokio::test]
    async fn test_in_memory_window_prune_and_count() {
        let storage = InMemoryRateLimitStorage::new();

        for (score, member) in [(100, "a"), (200, "b"), (300, "c")] {
            storage
                .record_hit("test:window", score, member, 60)
                .await
                .unwrap();
        }
        assert_eq!(storage.count_window("test:window").await.unwrap(), 3);
        assert_eq!(
            storage.count_window_since("test:window", 200).await.unwrap(),
            2
        );

        let removed = storage.prune_window("test:window", 200).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(storage.count_window("test:window").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_same_score_members_do_not_collide() {
        let storage = InMemoryRateLimitStorage::new();

        storage.record_hit("k", 100, "100-a", 60).await.unwrap();
        storage.record_hit("k", 100, "100-b", 60).await.unwrap();

        assert_eq!(storage.count_window("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_admit_blocks_at_limit() {
        let storage = InMemoryRateLimitStorage::new();
        let now = current_time_millis();

        let first = storage.admit(&admit_request(now, 1, 5_000)).await.unwrap();
        assert_eq!(first, AdmitDecision::Admitted { count: 0 });

        let second = storage.admit(&admit_request(now, 1, 5_000)).await.unwrap();
        assert_eq!(
            second,
            AdmitDecision::BlockCreated {
                blocked_until: now + 5_000,
                count: 1
            }
        );

        let third = storage.admit(&admit_request(now, 1, 5_000)).await.unwrap();
        assert_eq!(
            third,
            AdmitDecision::AlreadyBlocked {
                blocked_until: now + 5_000
            }
        );
    }

    #[tokio::test]
    async fn test_in_memory_admit_block_expiry_saturates() {
        let storage = InMemoryRateLimitStorage::new();
        let now = current_time_millis();

        storage.admit(&admit_request(now, 1, u64::MAX)).await.unwrap();
        let second = storage.admit(&admit_request(now, 1, u64::MAX)).await.unwrap();
        assert_eq!(
            second,
            AdmitDecision::BlockCreated {
                blocked_until: u64::MAX,
                count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_in_memory_admit_soft_limit() {
        let storage = InMemoryRateLimitStorage::new();
        let now = current_time_millis();

        storage.admit(&admit_request(now, 1, 0)).await.unwrap();
        let second = storage.admit(&admit_request(now, 1, 0)).await.unwrap();
        assert_eq!(second, AdmitDecision::Limited { count: 1 });
        assert!(storage.get_block("test:block").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_delete() {
        let storage = InMemoryRateLimitStorage::new();

        storage.record_hit("test:delete", 1, "a", 60).await.unwrap();
        storage.set_block("test:delete:block", 1, 60).await.unwrap();

        let removed = storage
            .delete(&["test:delete".to_string(), "test:delete:block".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.key_count().await, 0);

        // Deleting missing keys is a no-op
        let removed = storage.delete(&["missing".to_string()]).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_in_memory_purge_expired_frees_entries() {
        let storage = InMemoryRateLimitStorage::new();
        for i in 0..5 {
            storage
                .record_hit(&format!("short:requests:{}", i), 1, "a", 1)
                .await
                .unwrap();
            storage
                .set_block(&format!("short:block:{}", i), 1, 1)
                .await
                .unwrap();
        }
        storage.record_hit("long:requests", 1, "a", 60).await.unwrap();
        assert_eq!(storage.held_entries().await, 11);

        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(storage.purge_expired().await.unwrap(), 10);
        assert_eq!(storage.windows.read().await.len(), 1);
        assert!(storage.blocks.read().await.is_empty());
        assert_eq!(storage.count_window("long:requests").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_scan_pages_through_keys() {
        let storage = InMemoryRateLimitStorage::new();
        for i in 0..5 {
            storage
                .record_hit(&format!("p:requests:{}", i), 1, "a", 60)
                .await
                .unwrap();
        }
        storage.set_block("p:block:x", 1, 60).await.unwrap();

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, batch) = storage.scan("p:requests:*", cursor, 2).await.unwrap();
            assert!(batch.len() <= 2);
            seen.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 5);
    }
}
