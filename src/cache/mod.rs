//! Forecast cache
//!
//! Tomorrow's maximum for a grid cell is cached under a key built from the quantized
//! coordinates and the forecast date (see [`ForecastKey::cache_key`]). Entries expire
//! after the configured TTL.

mod memory;
mod redis_cache;

pub use memory::InMemoryForecastCache;
pub use redis_cache::RedisForecastCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::ForecastKey;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid cache data for {key}: {value}")]
    InvalidData { key: String, value: String },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Key-value store for forecast maxima. Implementations are shared across workers and
/// must tolerate concurrent writers; a duplicate write stores the same value.
#[async_trait]
pub trait ForecastCache: Send + Sync {
    async fn get(&self, key: &ForecastKey) -> CacheResult<Option<f64>>;

    async fn set(&self, key: &ForecastKey, temperature: f64, ttl: Duration) -> CacheResult<()>;

    /// Remove every entry
    async fn flush(&self) -> CacheResult<()>;
}
