//! Abstract cache backend (`get`/`set`/`purge`/TTL) plus a default
//! in-memory implementation bounded to ~5,000 entries, generalizing the
//! teacher's `ArchiveCache` (an `lru::LruCache` behind an `RwLock`) from
//! a single fixed keyspace into a reusable provider any of the four
//! cache layers can sit on top of.

use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 5_000;

struct Slot {
    value: Bytes,
    expires_at: Option<Instant>,
}

/// Abstract cache backend. A remote provider (e.g. a key-value store)
/// implements the same trait and is interchangeable with the default.
#[async_trait::async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get(&self, key: &str) -> Option<Bytes>;
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>);
    async fn purge(&self, key: &str);
}

/// Default in-memory provider: an LRU map with per-entry TTL, bounded to
/// `DEFAULT_CAPACITY` entries. Persisted state is always volatile; no
/// durability claims are made.
pub struct InMemoryCacheProvider {
    cache: RwLock<LruCache<String, Slot>>,
}

impl InMemoryCacheProvider {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        InMemoryCacheProvider {
            cache: RwLock::new(LruCache::new(cap)),
        }
    }
}

impl Default for InMemoryCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheProvider for InMemoryCacheProvider {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut cache = self.cache.write().ok()?;
        match cache.get(key) {
            Some(slot) => {
                if let Some(expires_at) = slot.expires_at {
                    if Instant::now() >= expires_at {
                        cache.pop(key);
                        return None;
                    }
                }
                Some(slot.value.clone())
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.put(
                key.to_string(),
                Slot {
                    value,
                    expires_at: ttl.map(|d| Instant::now() + d),
                },
            );
        }
    }

    async fn purge(&self, key: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.pop(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ttl_expiry_is_a_miss() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(10))).await;
        assert!(provider.get("k").await.is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(provider.get("k").await.is_none());
    }

    #[tokio::test]
    async fn purge_removes_entry() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", Bytes::from_static(b"v"), None).await;
        provider.purge("k").await;
        assert!(provider.get("k").await.is_none());
    }
}
