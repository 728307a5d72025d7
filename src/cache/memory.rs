use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::{CacheResult, ForecastCache};
use crate::models::ForecastKey;

#[derive(Debug, Clone, Copy)]
struct CachedForecast {
    temperature: f64,
    expires_at: Instant,
}

impl CachedForecast {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local forecast cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct InMemoryForecastCache {
    entries: Mutex<HashMap<String, CachedForecast>>,
}

impl InMemoryForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedForecast>> {
        // A panic while holding the lock leaves the map itself intact
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ForecastCache for InMemoryForecastCache {
    async fn get(&self, key: &ForecastKey) -> CacheResult<Option<f64>> {
        let cache_key = key.cache_key();
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(&cache_key).copied() {
            Some(entry) if !entry.is_expired(now) => {
                debug!(key = %cache_key, "Cache hit");
                Ok(Some(entry.temperature))
            }
            Some(_) => {
                entries.remove(&cache_key);
                debug!(key = %cache_key, "Cache entry expired");
                Ok(None)
            }
            None => {
                debug!(key = %cache_key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &ForecastKey, temperature: f64, ttl: Duration) -> CacheResult<()> {
        let entry = CachedForecast {
            temperature,
            expires_at: Instant::now() + ttl,
        };
        self.lock().insert(key.cache_key(), entry);
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.lock().clear();
        Ok(())
    }
}
