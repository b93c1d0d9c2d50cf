//! In-memory cache implementation with hit/miss statistics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use super::Cache;
use crate::error::CacheError;

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at < Instant::now())
    }
}

/// Point-in-time snapshot of cache usage. `hit_rate` is `hits / (hits + misses)`,
/// or `0.0` when nothing has been looked up yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

/// In-memory cache guarded by a single `RwLock`, with TTL-based expiration
/// and running hit/miss counters surfaced via [`InMemoryCache::stats`].
pub struct InMemoryCache<K, V> {
    data: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Removes expired entries and returns how many were evicted.
    pub async fn sweep_expired(&self) -> u64 {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        let evicted = (before - data.len()) as u64;
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<K, V> Cache<K, V> for InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        let entry = CacheEntry { value, expires_at };
        let mut data = self.data.write().await;
        data.insert(key, entry);
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_get_set() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get(&"key".to_string()).await, None);
        cache.set("key".to_string(), "value".to_string(), None).await.unwrap();
        assert_eq!(cache.get(&"key".to_string()).await, Some("value".to_string()));
    }

    #[tokio::test]
    async fn ttl_expiry() {
        let cache = InMemoryCache::new();
        cache
            .set("key".to_string(), "value".to_string(), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(cache.get(&"key".to_string()).await, Some("value".to_string()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache.get(&"missing".to_string()).await;
        cache.set("key".to_string(), "value".to_string(), None).await.unwrap();
        cache.get(&"key".to_string()).await;
        cache.get(&"key".to_string()).await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert!((stats.hit_rate - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sweep_expired_counts_evictions() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache
            .set("a".to_string(), "1".to_string(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        cache.set("b".to_string(), "2".to_string(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let evicted = cache.sweep_expired().await;
        assert_eq!(evicted, 1);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.get(&"b".to_string()).await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let cache = InMemoryCache::new();
        cache.set("k1".to_string(), "v1".to_string(), None).await.unwrap();
        cache.set("k2".to_string(), "v2".to_string(), None).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get(&"k1".to_string()).await, None);
        assert_eq!(cache.get(&"k2".to_string()).await, None);
    }
}
