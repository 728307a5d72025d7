use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheResult, ForecastCache};
use crate::models::ForecastKey;

/// Redis-backed forecast cache. The connection manager multiplexes one connection and
/// reconnects on failure; clones share it.
#[derive(Clone)]
pub struct RedisForecastCache {
    connection: ConnectionManager,
}

impl RedisForecastCache {
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl ForecastCache for RedisForecastCache {
    async fn get(&self, key: &ForecastKey) -> CacheResult<Option<f64>> {
        let cache_key = key.cache_key();
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&cache_key).await.map_err(|e| {
            warn!(key = %cache_key, error = %e, "Redis get error");
            CacheError::Redis(e)
        })?;

        match value {
            Some(raw) => {
                let temperature = raw.parse::<f64>().map_err(|_| CacheError::InvalidData {
                    key: cache_key.clone(),
                    value: raw.clone(),
                })?;
                debug!(key = %cache_key, "Cache hit");
                Ok(Some(temperature))
            }
            None => {
                debug!(key = %cache_key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &ForecastKey, temperature: f64, ttl: Duration) -> CacheResult<()> {
        let cache_key = key.cache_key();
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.connection.clone();

        conn.set_ex::<_, _, ()>(&cache_key, temperature.to_string(), ttl_secs)
            .await?;

        debug!(key = %cache_key, ttl = ttl_secs, "Cache set");
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("FLUSHDB")
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!("Flushed Redis forecast cache");
        Ok(())
    }
}
