//! In-process cache backend
//!
//! Entries expire lazily on read; `purge_expired` drops stale entries in bulk.
//! Values are lost on restart and are not shared between instances.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::KeyValueCache;
use crate::error::CacheError;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// `DashMap`-backed cache with per-entry expiry
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of stored entries, including ones that expired but were not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("verification:a", "processing", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            cache.get("verification:a").await.unwrap().as_deref(),
            Some("processing")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("verification:a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_value_and_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("k", "processing", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("k", "{\"score\":0.9}", Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(
            cache.get("k").await.unwrap().as_deref(),
            Some("{\"score\":0.9}")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "x", Duration::from_secs(1)).await.unwrap();
        cache.set("long", "y", Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("long").await.unwrap().is_some());
    }
}
