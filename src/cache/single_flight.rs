//! Single-flight coalescing: one reusable primitive sitting in front of
//! a TTL cache, rather than reinventing the coalescing logic per cache.
//!
//! The lock table is a `dashmap::DashMap` of per-key `tokio::sync::Mutex`
//! guards. Concurrent misses for the same key queue on that key's mutex;
//! the first to acquire it re-checks the cache (in case a racing filler
//! just finished) and, if still missing, runs the loader and populates
//! the cache before releasing the lock. Everyone queued behind it then
//! observes a cache hit. This also gives leader promotion and abandonment
//! for free: if the current leader's future is dropped mid-fill, the
//! mutex unlocks, the next waiter in line acquires it, finds the cache
//! still empty, and becomes the new leader; if there are no waiters the
//! lock is simply released and the cache stays in miss state.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        SingleFlight { locks: DashMap::new() }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `check` to test for a cache hit; on miss, serialize fills for
    /// `key` and run `load` exactly once per gap, re-checking `check`
    /// after acquiring the lock so a racing filler's result is reused.
    pub async fn get_or_fill<T, E, Check, CheckFut, Load, LoadFut>(
        &self,
        key: &str,
        check: Check,
        load: Load,
    ) -> Result<T, E>
    where
        Check: Fn() -> CheckFut,
        CheckFut: Future<Output = Option<T>>,
        Load: FnOnce() -> LoadFut,
        LoadFut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = check().await {
            return Ok(hit);
        }

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        if let Some(hit) = check().await {
            return Ok(hit);
        }

        load().await
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn concurrent_misses_call_loader_once() {
        let flight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let store: Arc<StdMutex<Option<u32>>> = Arc::new(StdMutex::new(None));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_fill::<u32, (), _, _, _, _>(
                        "k",
                        || async { *store.lock().unwrap() },
                        || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            *store.lock().unwrap() = Some(42);
                            Ok(42)
                        },
                    )
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
