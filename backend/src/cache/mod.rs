//! Key/value cache with per-entry TTL.
//!
//! [`CacheStore`] is the raw byte interface a distributed cache would offer
//! (get / set with TTL / remove). [`MemoryCache`] implements it in-process.
//! [`JsonCache`] stores typed values as JSON on top of any store.
//!
//! Entries expire by TTL only; there is no size bound or eviction policy.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheResult;

/// Byte-level cache backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;
    async fn remove(&self, key: &str) -> CacheResult<()>;
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped when read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Guard dropped above; safe to take the write lock
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Typed JSON cache over a [`CacheStore`].
#[derive(Clone)]
pub struct JsonCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl JsonCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// In-memory cache with the given TTL.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(key, bytes, self.ttl).await
    }

    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        self.store.remove(key).await
    }

    /// Read-through: return the cached value or load, store and return it.
    ///
    /// Cache failures never fail the read; the loader result is returned
    /// as-is and the problem is logged.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => crate::api::logs::log_warning(format!("Cache read failed for {}: {}", key, e)),
        }

        let value = load().await?;
        if let Err(e) = self.set(key, &value).await {
            crate::api::logs::log_warning(format!("Cache write failed for {}: {}", key, e));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_set_get_remove() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        cache.remove("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_dropped() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = JsonCache::in_memory(Duration::from_secs(60));
        cache.set("nums", &vec![1, 2, 3]).await.unwrap();

        let nums: Option<Vec<i32>> = cache.get("nums").await.unwrap();
        assert_eq!(nums, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_get_or_load_loads_once() {
        let cache = JsonCache::in_memory(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<String, ()> = cache
                .get_or_load("name", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Ana".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "Ana");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_load_does_not_cache_errors() {
        let cache = JsonCache::in_memory(Duration::from_secs(60));

        let first: Result<String, &str> = cache.get_or_load("k", || async { Err("down") }).await;
        assert!(first.is_err());

        let second: Result<String, &str> =
            cache.get_or_load("k", || async { Ok("up".to_string()) }).await;
        assert_eq!(second.unwrap(), "up");
    }
}
