use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::cache::ForecastCache;
use crate::error::ResolveError;
use crate::forecast::ForecastProvider;
use crate::models::{ForecastKey, ForecastWindow, QuantizedPoint};
use crate::utils::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

type InFlightMap = Mutex<HashMap<String, InFlightEntry>>;

struct InFlightEntry {
    gate: Arc<AsyncMutex<()>>,
    holders: usize,
}

/// One worker's registration against a cache key. The entry is removed when the
/// last registered worker drops its handle.
struct InFlight<'a> {
    entries: &'a InFlightMap,
    key: String,
    gate: Arc<AsyncMutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(entries: &'a InFlightMap, key: String) -> Self {
        let gate = {
            let mut map = lock_entries(entries);
            let entry = map.entry(key.clone()).or_insert_with(|| InFlightEntry {
                gate: Arc::new(AsyncMutex::new(())),
                holders: 0,
            });
            entry.holders += 1;
            entry.gate.clone()
        };

        Self { entries, key, gate }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = lock_entries(self.entries);
        if let Some(entry) = map.get_mut(&self.key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                map.remove(&self.key);
            }
        }
    }
}

fn lock_entries(entries: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlightEntry>> {
    // The map is only mutated under the lock, so a poisoned guard is still consistent
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache-first lookup of tomorrow's maximum temperature for a grid cell.
///
/// A miss goes to the provider and the answer is written back with the configured TTL.
/// Concurrent misses on the same key share one provider request: the first worker
/// fetches while the rest wait and then read the stored value. If that fetch fails
/// the next waiter tries again.
pub struct ForecastResolver {
    cache: Arc<dyn ForecastCache>,
    provider: Arc<dyn ForecastProvider>,
    ttl: Duration,
    timeout: Duration,
    in_flight: InFlightMap,
    cache_hits: AtomicUsize,
    provider_calls: AtomicUsize,
}

impl ForecastResolver {
    pub fn new(cache: Arc<dyn ForecastCache>, provider: Arc<dyn ForecastProvider>) -> Self {
        Self {
            cache,
            provider,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            in_flight: Mutex::new(HashMap::new()),
            cache_hits: AtomicUsize::new(0),
            provider_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Upper bound for each cache or provider call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn resolve(
        &self,
        point: &QuantizedPoint,
        window: &ForecastWindow,
    ) -> Result<f64, ResolveError> {
        let key = ForecastKey::new(*point, window.forecast_date());

        if let Some(temperature) = self.cached(&key, point).await? {
            return Ok(temperature);
        }

        let in_flight = InFlight::join(&self.in_flight, key.cache_key());
        let _turn = in_flight.gate.lock().await;

        // Whoever held the gate before us may have stored the value already
        if let Some(temperature) = self.cached(&key, point).await? {
            return Ok(temperature);
        }

        self.fetch(&key, point, window).await
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }

    async fn cached(
        &self,
        key: &ForecastKey,
        point: &QuantizedPoint,
    ) -> Result<Option<f64>, ResolveError> {
        let cached = self.bounded("cache lookup", self.cache.get(key)).await?;
        if let Some(temperature) = cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(%point, temperature, "retrieved from cache");
        }
        Ok(cached)
    }

    async fn fetch(
        &self,
        key: &ForecastKey,
        point: &QuantizedPoint,
        window: &ForecastWindow,
    ) -> Result<f64, ResolveError> {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        let temperature = self
            .bounded(
                "forecast request",
                self.provider.max_temperature(point, window),
            )
            .await?;
        debug!(%point, temperature, "retrieved from api call");

        self.bounded("cache write", self.cache.set(key, temperature, self.ttl))
            .await?;

        Ok(temperature)
    }

    async fn bounded<T, E, F>(&self, operation: &'static str, call: F) -> Result<T, ResolveError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ResolveError>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(ResolveError::Timeout {
                operation,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheResult, InMemoryForecastCache};
    use crate::forecast::ProviderError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct CountingProvider {
        temperature: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForecastProvider for CountingProvider {
        async fn max_temperature(
            &self,
            _point: &QuantizedPoint,
            _window: &ForecastWindow,
        ) -> Result<f64, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.temperature)
        }
    }

    /// Answers after a delay so concurrent callers overlap
    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl SlowProvider {
        fn new(fail_first: bool) -> Self {
            Self {
                delay: Duration::from_millis(20),
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl ForecastProvider for SlowProvider {
        async fn max_temperature(
            &self,
            _point: &QuantizedPoint,
            _window: &ForecastWindow,
        ) -> Result<f64, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_first && call == 0 {
                return Err(ProviderError::NoData);
            }
            Ok(18.25)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ForecastProvider for FailingProvider {
        async fn max_temperature(
            &self,
            _point: &QuantizedPoint,
            _window: &ForecastWindow,
        ) -> Result<f64, ProviderError> {
            Err(ProviderError::NoData)
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl ForecastProvider for HangingProvider {
        async fn max_temperature(
            &self,
            _point: &QuantizedPoint,
            _window: &ForecastWindow,
        ) -> Result<f64, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0.0)
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl ForecastCache for BrokenCache {
        async fn get(&self, key: &ForecastKey) -> CacheResult<Option<f64>> {
            Err(crate::cache::CacheError::InvalidData {
                key: key.cache_key(),
                value: "garbage".to_string(),
            })
        }

        async fn set(&self, _key: &ForecastKey, _t: f64, _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }

        async fn flush(&self) -> CacheResult<()> {
            Ok(())
        }
    }

    fn window() -> ForecastWindow {
        ForecastWindow::new(
            Utc.with_ymd_and_hms(2018, 6, 1, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 6, 2, 13, 59, 59).unwrap(),
        )
        .unwrap()
    }

    fn point() -> QuantizedPoint {
        QuantizedPoint {
            latitude: -33.9,
            longitude: 151.2,
        }
    }

    #[tokio::test]
    async fn test_miss_calls_provider_once_then_hits_cache() {
        let cache = Arc::new(InMemoryForecastCache::new());
        let provider = Arc::new(CountingProvider {
            temperature: 21.5,
            calls: AtomicUsize::new(0),
        });
        let resolver = ForecastResolver::new(cache.clone(), provider.clone());

        assert_eq!(resolver.resolve(&point(), &window()).await.unwrap(), 21.5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        assert_eq!(resolver.resolve(&point(), &window()).await.unwrap(), 21.5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache_hits(), 1);
        assert_eq!(resolver.provider_calls(), 1);
    }

    #[tokio::test]
    async fn test_different_cells_fetch_separately() {
        let cache = Arc::new(InMemoryForecastCache::new());
        let provider = Arc::new(CountingProvider {
            temperature: 10.0,
            calls: AtomicUsize::new(0),
        });
        let resolver = ForecastResolver::new(cache, provider.clone());

        let other = QuantizedPoint {
            latitude: 51.5,
            longitude: -0.1,
        };
        resolver.resolve(&point(), &window()).await.unwrap();
        resolver.resolve(&other, &window()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_cached() {
        let cache = Arc::new(InMemoryForecastCache::new());
        let resolver = ForecastResolver::new(cache.clone(), Arc::new(FailingProvider));

        let err = resolver.resolve(&point(), &window()).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::Provider("No forecast data inside the requested window".to_string())
        );
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_failure_surfaces() {
        let provider = Arc::new(CountingProvider {
            temperature: 1.0,
            calls: AtomicUsize::new(0),
        });
        let resolver = ForecastResolver::new(Arc::new(BrokenCache), provider.clone());

        assert!(matches!(
            resolver.resolve(&point(), &window()).await,
            Err(ResolveError::Cache(_))
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let resolver = ForecastResolver::new(
            Arc::new(InMemoryForecastCache::new()),
            Arc::new(HangingProvider),
        )
        .with_timeout(Duration::from_secs(5));

        assert_eq!(
            resolver.resolve(&point(), &window()).await,
            Err(ResolveError::Timeout {
                operation: "forecast request",
                seconds: 5
            })
        );
    }

    async fn resolve_concurrently(
        resolver: Arc<ForecastResolver>,
        callers: usize,
    ) -> Vec<Result<f64, ResolveError>> {
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..callers {
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.resolve(&point(), &window()).await });
        }

        let mut results = Vec::with_capacity(callers);
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_request() {
        let cache = Arc::new(InMemoryForecastCache::new());
        let provider = Arc::new(SlowProvider::new(false));
        let resolver = Arc::new(ForecastResolver::new(cache.clone(), provider.clone()));

        let results = resolve_concurrently(resolver.clone(), 8).await;

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r == &Ok(18.25)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.provider_calls(), 1);
        assert_eq!(resolver.cache_hits(), 7);
        assert_eq!(cache.len(), 1);
        assert!(resolver.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_retry_after_failed_fetch() {
        let provider = Arc::new(SlowProvider::new(true));
        let resolver = Arc::new(ForecastResolver::new(
            Arc::new(InMemoryForecastCache::new()),
            provider.clone(),
        ));

        let results = resolve_concurrently(resolver.clone(), 4).await;

        let failures = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(failures, 1);
        assert_eq!(results.iter().filter(|r| *r == &Ok(18.25)).count(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.in_flight.lock().unwrap().is_empty());
    }
}
