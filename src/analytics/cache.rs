use crate::error::CacheError;
use crate::types::AnalyticsSummary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Storage behind [`AnalyticsCache`]. Values are opaque serialized strings;
/// a remote implementation may fail or stall, which the cache layer turns
/// into a bypass rather than a request failure.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Value for `key`, or `None` if absent or expired at `now`.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn put(
        &self,
        key: String,
        value: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process backend on a bounded moka cache. Expiry is checked on read;
/// moka's capacity bound evicts entries nobody reads.
pub struct MemoryCacheBackend {
    inner: Cache<String, CacheEntry>,
}

impl MemoryCacheBackend {
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>, CacheError> {
        match self.inner.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            Some(_) => {
                self.inner.invalidate(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: String,
        value: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.inner.insert(key, CacheEntry { value, expires_at });
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.inner.invalidate(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Cache of per-resource analytics summaries keyed on `"analytics:{resource_id}"`.
///
/// Summaries cross the backend seam as JSON and are decoded back into
/// [`AnalyticsSummary`]; every backend call is bounded by `timeout`.
pub struct AnalyticsCache {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
}

impl AnalyticsCache {
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn in_memory(max_entries: u64, timeout: Duration) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new(max_entries)), timeout)
    }

    pub fn cache_key(resource_id: i64) -> String {
        format!("analytics:{resource_id}")
    }

    pub async fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AnalyticsSummary>, CacheError> {
        let raw = self.bounded(self.backend.get(key, now)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put(
        &self,
        key: &str,
        value: &AnalyticsSummary,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let ttl = chrono::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.bounded(self.backend.put(key.to_string(), json, expires_at))
            .await
    }

    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.bounded(self.backend.invalidate(key)).await
    }

    /// Whether the backend answers within the timeout.
    pub async fn ping(&self) -> bool {
        self.bounded(self.backend.ping()).await.is_ok()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}
