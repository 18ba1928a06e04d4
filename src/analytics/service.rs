use crate::analytics::aggregate;
use crate::analytics::cache::AnalyticsCache;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::ingest::rate_limit::SlidingWindowLimiter;
use crate::registry::ResourceRegistry;
use crate::storage::EventStore;
use crate::types::AnalyticsResponse;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Write path: admit, append, invalidate. Read path: cache, else compute and
/// populate.
///
/// Invalidate-on-write is the only coherence mechanism. A read that missed
/// before a concurrent write and populates after its invalidation can cache a
/// pre-write summary until the TTL runs out.
pub struct AnalyticsService {
    registry: Arc<dyn ResourceRegistry>,
    limiter: Arc<SlidingWindowLimiter>,
    events: Arc<EventStore>,
    cache: AnalyticsCache,
    clock: Arc<dyn Clock>,
    summary_ttl_secs: u64,
}

impl AnalyticsService {
    pub fn new(
        registry: Arc<dyn ResourceRegistry>,
        limiter: Arc<SlidingWindowLimiter>,
        events: Arc<EventStore>,
        cache: AnalyticsCache,
        clock: Arc<dyn Clock>,
        summary_ttl_secs: u64,
    ) -> Self {
        Self {
            registry,
            limiter,
            events,
            cache,
            clock,
            summary_ttl_secs,
        }
    }

    /// Wire a service with an in-memory event store and cache.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<dyn ResourceRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            registry,
            Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit)),
            Arc::new(EventStore::new()),
            AnalyticsCache::in_memory(config.cache.max_entries, config.cache.timeout()),
            clock,
            config.cache.ttl_secs,
        )
    }

    pub fn limiter(&self) -> Arc<SlidingWindowLimiter> {
        self.limiter.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Check that `resource_id` exists and admit one write from `client_identity`.
    /// An admitted call consumes a slot in the client's window.
    pub async fn admit_write(&self, resource_id: i64, client_identity: &str) -> AppResult<()> {
        self.admit_write_at(resource_id, client_identity, self.clock.now())
            .await
    }

    /// Record one view of `resource_id` by `client_identity`.
    pub async fn record_view(&self, resource_id: i64, client_identity: &str) -> AppResult<()> {
        let now = self.clock.now();
        self.admit_write_at(resource_id, client_identity, now).await?;

        self.events.append(resource_id, client_identity, now);

        let key = AnalyticsCache::cache_key(resource_id);
        if let Err(e) = self.cache.invalidate(&key).await {
            tracing::warn!(
                resource_id,
                error = %e,
                "cache invalidation failed, summary may be stale until ttl"
            );
        }

        tracing::debug!(resource_id, identity = %client_identity, "view recorded");
        Ok(())
    }

    /// Summary for `resource_id`, from cache when fresh.
    pub async fn get_analytics(&self, resource_id: i64) -> AppResult<AnalyticsResponse> {
        self.ensure_exists(resource_id).await?;

        let now = self.clock.now();
        let key = AnalyticsCache::cache_key(resource_id);

        match self.cache.get(&key, now).await {
            Ok(Some(summary)) => {
                tracing::debug!(resource_id, "analytics cache hit");
                return Ok(AnalyticsResponse {
                    cached: true,
                    summary,
                });
            }
            Ok(None) => tracing::debug!(resource_id, "analytics cache miss"),
            Err(e) => {
                tracing::warn!(resource_id, error = %e, "analytics cache bypassed");
            }
        }

        let summary = aggregate::compute(&self.events.read_all(resource_id));

        if let Err(e) = self
            .cache
            .put(&key, &summary, self.summary_ttl_secs, now)
            .await
        {
            tracing::warn!(resource_id, error = %e, "failed to cache analytics summary");
        }

        Ok(AnalyticsResponse {
            cached: false,
            summary,
        })
    }

    pub async fn cache_healthy(&self) -> bool {
        self.cache.ping().await
    }

    async fn admit_write_at(
        &self,
        resource_id: i64,
        client_identity: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.ensure_exists(resource_id).await?;

        if !self.limiter.admit(client_identity, now) {
            tracing::warn!(
                resource_id,
                identity = %client_identity,
                "write rejected by rate limiter"
            );
            return Err(AppError::RateLimited {
                retry_after_secs: self.limiter.retry_after_secs(),
            });
        }
        Ok(())
    }

    async fn ensure_exists(&self, resource_id: i64) -> AppResult<()> {
        if self.registry.resource_exists(resource_id).await {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("resource {resource_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::cache::CacheBackend;
    use crate::clock::ManualClock;
    use crate::error::CacheError;
    use crate::registry::{InMemoryRegistry, Resource};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn registry_with(ids: &[i64]) -> Arc<InMemoryRegistry> {
        let registry = InMemoryRegistry::new();
        for &id in ids {
            registry.insert(Resource {
                id,
                title: format!("resource {id}"),
                kind: "video".to_string(),
                file_url: format!("https://cdn.example.com/{id}.mp4"),
            });
        }
        Arc::new(registry)
    }

    fn service_with_cache(cache: AnalyticsCache) -> (AnalyticsService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let service = AnalyticsService::new(
            registry_with(&[42, 7]),
            Arc::new(SlidingWindowLimiter::new(
                5,
                std::time::Duration::from_secs(60),
            )),
            Arc::new(EventStore::new()),
            cache,
            clock.clone(),
            60,
        );
        (service, clock)
    }

    fn service() -> (AnalyticsService, Arc<ManualClock>) {
        service_with_cache(AnalyticsCache::in_memory(
            100,
            std::time::Duration::from_millis(250),
        ))
    }

    /// Backend that always errors, counting calls.
    #[derive(Default)]
    struct DownBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _: &str, _: DateTime<Utc>) -> Result<Option<String>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn put(&self, _: String, _: String, _: DateTime<Utc>) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn invalidate(&self, _: &str) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_five_views_then_rate_limited_then_cached_read() {
        let (service, _clock) = service();

        for _ in 0..5 {
            service.record_view(42, "1.2.3.4").await.unwrap();
        }
        let err = service.record_view(42, "1.2.3.4").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RateLimited {
                retry_after_secs: 60
            }
        ));

        let first = service.get_analytics(42).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.summary.total_views, 5);
        assert_eq!(first.summary.unique_clients, 1);
        assert_eq!(first.summary.views_per_day.len(), 1);
        assert_eq!(first.summary.views_per_day["2024-03-01"], 5);

        let second = service.get_analytics(42).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.summary, first.summary);
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_summary() {
        let (service, _clock) = service();
        service.record_view(42, "1.2.3.4").await.unwrap();
        assert!(!service.get_analytics(42).await.unwrap().cached);
        assert!(service.get_analytics(42).await.unwrap().cached);

        service.record_view(42, "5.6.7.8").await.unwrap();
        let after = service.get_analytics(42).await.unwrap();
        assert!(!after.cached);
        assert_eq!(after.summary.total_views, 2);
        assert_eq!(after.summary.unique_clients, 2);
        assert_eq!(after.summary.views_per_day["2024-03-01"], 2);
    }

    #[tokio::test]
    async fn test_cached_summary_expires_after_ttl() {
        let (service, clock) = service();
        service.record_view(42, "1.2.3.4").await.unwrap();
        assert!(!service.get_analytics(42).await.unwrap().cached);

        clock.advance(Duration::seconds(30));
        assert!(service.get_analytics(42).await.unwrap().cached);

        clock.set(t0() + Duration::seconds(61));
        assert!(!service.get_analytics(42).await.unwrap().cached);
    }

    #[tokio::test]
    async fn test_rate_limit_window_reopens() {
        let (service, clock) = service();
        for _ in 0..5 {
            service.record_view(42, "1.2.3.4").await.unwrap();
        }
        clock.advance(Duration::seconds(59));
        assert!(service.record_view(42, "1.2.3.4").await.is_err());

        clock.set(t0() + Duration::seconds(61));
        service.record_view(42, "1.2.3.4").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_spans_resources_for_one_identity() {
        let (service, _clock) = service();
        for _ in 0..5 {
            service.record_view(42, "1.2.3.4").await.unwrap();
        }
        assert!(matches!(
            service.record_view(7, "1.2.3.4").await,
            Err(AppError::RateLimited { .. })
        ));
        service.record_view(7, "9.9.9.9").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_resource_is_not_found_and_spends_no_quota() {
        let (service, _clock) = service();
        for _ in 0..10 {
            assert!(matches!(
                service.record_view(999, "1.2.3.4").await,
                Err(AppError::NotFound(_))
            ));
        }
        assert!(matches!(
            service.get_analytics(999).await,
            Err(AppError::NotFound(_))
        ));
        service.record_view(42, "1.2.3.4").await.unwrap();
    }

    #[tokio::test]
    async fn test_admit_write_consumes_a_slot() {
        let (service, _clock) = service();
        for _ in 0..5 {
            service.admit_write(42, "1.2.3.4").await.unwrap();
        }
        assert!(matches!(
            service.admit_write(42, "1.2.3.4").await,
            Err(AppError::RateLimited { .. })
        ));
        assert!(matches!(
            service.admit_write(1000, "5.5.5.5").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_resource_reports_zero() {
        let (service, _clock) = service();
        let resp = service.get_analytics(7).await.unwrap();
        assert!(!resp.cached);
        assert_eq!(resp.summary.total_views, 0);
        assert_eq!(resp.summary.unique_clients, 0);
        assert!(resp.summary.views_per_day.is_empty());
    }

    #[tokio::test]
    async fn test_down_cache_degrades_to_recompute() {
        let backend = Arc::new(DownBackend::default());
        let cache = AnalyticsCache::new(backend.clone(), std::time::Duration::from_millis(50));
        let (service, _clock) = service_with_cache(cache);

        service.record_view(42, "1.2.3.4").await.unwrap();
        service.record_view(42, "5.6.7.8").await.unwrap();

        for _ in 0..2 {
            let resp = service.get_analytics(42).await.unwrap();
            assert!(!resp.cached);
            assert_eq!(resp.summary.total_views, 2);
        }
        assert!(backend.calls.load(Ordering::SeqCst) >= 4);
        assert!(!service.cache_healthy().await);
    }

    #[tokio::test]
    async fn test_views_across_days() {
        let (service, clock) = service();
        service.record_view(42, "a").await.unwrap();
        clock.advance(Duration::hours(24));
        service.record_view(42, "b").await.unwrap();
        service.record_view(42, "a").await.unwrap();

        let resp = service.get_analytics(42).await.unwrap();
        assert_eq!(resp.summary.total_views, 3);
        assert_eq!(resp.summary.unique_clients, 2);
        assert_eq!(resp.summary.views_per_day["2024-03-01"], 1);
        assert_eq!(resp.summary.views_per_day["2024-03-02"], 2);
    }
}
