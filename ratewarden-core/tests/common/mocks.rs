//! Storage doubles for failure-path tests

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ratewarden_core::infrastructure::rate_limiter::types::{AdmitDecision, AdmitRequest};
use ratewarden_core::infrastructure::rate_limiter::{
    InMemoryRateLimitStorage, RateLimitStorage, StorageError,
};

/// Store that rejects every command, as if the server were down
#[derive(Default)]
pub struct FailingStorage {
    pub calls: AtomicU64,
}

impl FailingStorage {
    fn fail<T>(&self) -> Result<T, StorageError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(StorageError::Connection("connection refused".to_string()))
    }
}

#[async_trait]
impl RateLimitStorage for FailingStorage {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get_block(&self, _key: &str) -> Result<Option<u64>, StorageError> {
        self.fail()
    }

    async fn set_block(&self, _key: &str, _until: u64, _ttl_secs: u64) -> Result<(), StorageError> {
        self.fail()
    }

    async fn prune_window(&self, _key: &str, _before: u64) -> Result<u64, StorageError> {
        self.fail()
    }

    async fn count_window(&self, _key: &str) -> Result<u64, StorageError> {
        self.fail()
    }

    async fn count_window_since(&self, _key: &str, _since: u64) -> Result<u64, StorageError> {
        self.fail()
    }

    async fn record_hit(
        &self,
        _key: &str,
        _score: u64,
        _member: &str,
        _ttl_secs: u64,
    ) -> Result<(), StorageError> {
        self.fail()
    }

    async fn admit(&self, _request: &AdmitRequest<'_>) -> Result<AdmitDecision, StorageError> {
        self.fail()
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, StorageError> {
        self.fail()
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.fail()
    }

    async fn scan(
        &self,
        _pattern: &str,
        _cursor: u64,
        _count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        self.fail()
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.fail()
    }
}

/// Store whose every command hangs far longer than any test timeout
pub struct StallingStorage {
    pub stall: Duration,
}

impl StallingStorage {
    pub fn new() -> Self {
        Self {
            stall: Duration::from_secs(30),
        }
    }

    async fn hang<T>(&self, value: T) -> Result<T, StorageError> {
        tokio::time::sleep(self.stall).await;
        Ok(value)
    }
}

#[async_trait]
impl RateLimitStorage for StallingStorage {
    fn backend_name(&self) -> &'static str {
        "stalling"
    }

    async fn get_block(&self, _key: &str) -> Result<Option<u64>, StorageError> {
        self.hang(None).await
    }

    async fn set_block(&self, _key: &str, _until: u64, _ttl_secs: u64) -> Result<(), StorageError> {
        self.hang(()).await
    }

    async fn prune_window(&self, _key: &str, _before: u64) -> Result<u64, StorageError> {
        self.hang(0).await
    }

    async fn count_window(&self, _key: &str) -> Result<u64, StorageError> {
        self.hang(0).await
    }

    async fn count_window_since(&self, _key: &str, _since: u64) -> Result<u64, StorageError> {
        self.hang(0).await
    }

    async fn record_hit(
        &self,
        _key: &str,
        _score: u64,
        _member: &str,
        _ttl_secs: u64,
    ) -> Result<(), StorageError> {
        self.hang(()).await
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, StorageError> {
        self.hang(0).await
    }

    async fn scan(
        &self,
        _pattern: &str,
        _cursor: u64,
        _count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        self.hang((0, Vec::new())).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.hang(()).await
    }
}

/// In-memory store without the atomic admission path, like a server with scripting disabled
pub struct ScriptlessStorage {
    inner: Arc<InMemoryRateLimitStorage>,
}

impl ScriptlessStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryRateLimitStorage::new()),
        }
    }
}

#[async_trait]
impl RateLimitStorage for ScriptlessStorage {
    fn backend_name(&self) -> &'static str {
        "scriptless"
    }

    async fn get_block(&self, key: &str) -> Result<Option<u64>, StorageError> {
        self.inner.get_block(key).await
    }

    async fn set_block(&self, key: &str, until: u64, ttl_secs: u64) -> Result<(), StorageError> {
        self.inner.set_block(key, until, ttl_secs).await
    }

    async fn prune_window(&self, key: &str, before: u64) -> Result<u64, StorageError> {
        self.inner.prune_window(key, before).await
    }

    async fn count_window(&self, key: &str) -> Result<u64, StorageError> {
        self.inner.count_window(key).await
    }

    async fn count_window_since(&self, key: &str, since: u64) -> Result<u64, StorageError> {
        self.inner.count_window_since(key, since).await
    }

    async fn record_hit(
        &self,
        key: &str,
        score: u64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<(), StorageError> {
        self.inner.record_hit(key, score, member, ttl_secs).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StorageError> {
        self.inner.delete(keys).await
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.inner.purge_expired().await
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        self.inner.scan(pattern, cursor, count).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }
}
