//! Redis cache backend
//!
//! Uses a multiplexed `ConnectionManager` that reconnects on its own after a dropped
//! connection; the retry executor covers the window while it does.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::KeyValueCache;
use crate::error::CacheError;

/// Redis-backed cache (`SET key value EX ttl` / `GET key`).
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to `redis_url` and verify the server answers `PING`.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let mut manager = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;

        tracing::info!("Redis cache connected");
        Ok(Self { manager })
    }
}

/// Redis expiry is whole seconds; round up so short TTLs never become "no expiry".
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds(ttl)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_roundtrip_against_live_redis() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            eprintln!("REDIS_URL not set, skipping");
            return;
        };

        let cache = RedisCache::connect(&url).await.unwrap();
        let key = format!("verification:test-{}", uuid::Uuid::new_v4());

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache
            .set(&key, "processing", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("processing"));
    }
}
