//! Four byte-oriented keyspaces, each a thin, differently-TTL'd view
//! over one shared `CacheProvider`, with single-flight fills coalesced
//! per layer.

use super::provider::CacheProvider;
use super::single_flight::SingleFlight;
use crate::error::{MegError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const ARCHIVE_TTL: Duration = Duration::from_secs(30 * 60);
pub const ARCHIVE_TTL_MAX: Duration = Duration::from_secs(2 * 24 * 60 * 60);
pub const INDEX_TTL: Duration = Duration::from_secs(60);
pub const HEAD_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedHead {
    pub stored_key: String,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub accept_ranges: bool,
    pub etag: Option<String>,
}

/// Archive body cache: TTL 30 minutes by default, overridable per request
/// up to 2 days.
pub struct ArchiveCache {
    provider: Arc<dyn CacheProvider>,
    flight: SingleFlight,
    names: std::sync::RwLock<std::collections::HashSet<String>>,
}

impl ArchiveCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        ArchiveCache {
            provider,
            flight: SingleFlight::new(),
            names: std::sync::RwLock::new(std::collections::HashSet::new()),
        }
    }

    fn key(name: &str) -> String {
        format!("archives/{name}")
    }

    pub async fn get(&self, name: &str) -> Option<Bytes> {
        self.provider.get(&Self::key(name)).await
    }

    pub async fn set(&self, name: &str, body: Bytes, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(ARCHIVE_TTL).min(ARCHIVE_TTL_MAX);
        self.provider.set(&Self::key(name), body, Some(ttl)).await;
        if let Ok(mut names) = self.names.write() {
            names.insert(name.to_string());
        }
    }

    pub async fn purge(&self, name: &str) {
        self.provider.purge(&Self::key(name)).await;
    }

    /// Snapshot of every archive name ever written to this cache, for the
    /// invalidator's bootstrap case (ETag map empty, body cache populated).
    pub fn known_names(&self) -> Vec<String> {
        self.names.read().map(|n| n.iter().cloned().collect()).unwrap_or_default()
    }

    pub async fn get_or_fill<Load, LoadFut>(
        &self,
        name: &str,
        ttl: Option<Duration>,
        load: Load,
    ) -> Result<Bytes>
    where
        Load: FnOnce() -> LoadFut,
        LoadFut: std::future::Future<Output = Result<Bytes>>,
    {
        let key = Self::key(name);
        let provider = Arc::clone(&self.provider);
        let provider_for_check = Arc::clone(&provider);
        let ttl_value = ttl.unwrap_or(ARCHIVE_TTL).min(ARCHIVE_TTL_MAX);

        self.flight
            .get_or_fill(
                &key,
                || {
                    let provider = Arc::clone(&provider_for_check);
                    let key = key.clone();
                    async move { provider.get(&key).await }
                },
                || async move {
                    let body = load().await?;
                    provider.set(&key, body.clone(), Some(ttl_value)).await;
                    Ok(body)
                },
            )
            .await
    }
}

/// Central index cache: TTL 1 minute.
pub struct IndexCache {
    provider: Arc<dyn CacheProvider>,
    flight: SingleFlight,
}

impl IndexCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        IndexCache { provider, flight: SingleFlight::new() }
    }

    fn key(name: &str) -> String {
        format!("indexes/{name}")
    }

    pub async fn purge(&self, name: &str) {
        self.provider.purge(&Self::key(name)).await;
    }

    pub async fn get_or_fill<Load, LoadFut>(&self, name: &str, load: Load) -> Result<Bytes>
    where
        Load: FnOnce() -> LoadFut,
        LoadFut: std::future::Future<Output = Result<Bytes>>,
    {
        let key = Self::key(name);
        let provider = Arc::clone(&self.provider);
        let provider_for_check = Arc::clone(&provider);

        self.flight
            .get_or_fill(
                &key,
                || {
                    let provider = Arc::clone(&provider_for_check);
                    let key = key.clone();
                    async move { provider.get(&key).await }
                },
                || async move {
                    let body = load().await?;
                    provider.set(&key, body.clone(), Some(INDEX_TTL)).await;
                    Ok(body)
                },
            )
            .await
    }
}

/// HEAD metadata cache: TTL 10 seconds.
pub struct HeadCache {
    provider: Arc<dyn CacheProvider>,
    flight: SingleFlight,
}

impl HeadCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        HeadCache { provider, flight: SingleFlight::new() }
    }

    fn key(name: &str) -> String {
        format!("heads/{name}")
    }

    /// Plain point lookup, with no fill on miss. Used where a caller wants
    /// "whatever is already cached, or nothing" without triggering a fetch.
    pub async fn get(&self, name: &str) -> Option<CachedHead> {
        let bytes = self.provider.get(&Self::key(name)).await?;
        bincode::deserialize::<CachedHead>(&bytes).ok()
    }

    pub async fn get_or_fill<Load, LoadFut>(&self, name: &str, load: Load) -> Result<CachedHead>
    where
        Load: FnOnce() -> LoadFut,
        LoadFut: std::future::Future<Output = Result<CachedHead>>,
    {
        let key = Self::key(name);
        let provider = Arc::clone(&self.provider);
        let provider_for_check = Arc::clone(&provider);

        self.flight
            .get_or_fill(
                &key,
                || {
                    let provider = Arc::clone(&provider_for_check);
                    let key = key.clone();
                    async move {
                        let bytes = provider.get(&key).await?;
                        bincode::deserialize::<CachedHead>(&bytes).ok()
                    }
                },
                || async move {
                    let head = load().await?;
                    let encoded = bincode::serialize(&head)
                        .map_err(|e| MegError::DecodeError(format!("encode head cache entry: {e}")))?;
                    provider.set(&key, Bytes::from(encoded), Some(HEAD_TTL)).await;
                    Ok(head)
                },
            )
            .await
    }
}

/// Value held per archive name in the ETag map: the observed ETag plus
/// the stored key it was observed against, so the invalidator's periodic
/// poll can issue a conditional `get` without re-resolving `list`/`head`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtagEntry {
    pub stored_key: String,
    pub etag: String,
}

/// ETag map: no TTL, written by the invalidator and by every full fetch.
///
/// The `CacheProvider` contract is point-lookup only (so a remote
/// provider can stay opaque key-value bytes), but the invalidator's
/// periodic poll needs to enumerate every tracked archive name. The map
/// keeps that small name set alongside the provider rather than widening
/// `CacheProvider` itself with a `keys()` method no other layer needs.
pub struct EtagMap {
    provider: Arc<dyn CacheProvider>,
    names: std::sync::RwLock<std::collections::HashSet<String>>,
}

impl EtagMap {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        EtagMap {
            provider,
            names: std::sync::RwLock::new(std::collections::HashSet::new()),
        }
    }

    fn key(name: &str) -> String {
        format!("etags/{name}")
    }

    pub async fn get(&self, name: &str) -> Option<EtagEntry> {
        let bytes = self.provider.get(&Self::key(name)).await?;
        bincode::deserialize::<EtagEntry>(&bytes).ok()
    }

    pub async fn set(&self, name: &str, stored_key: &str, etag: &str) {
        let entry = EtagEntry { stored_key: stored_key.to_string(), etag: etag.to_string() };
        if let Ok(encoded) = bincode::serialize(&entry) {
            self.provider.set(&Self::key(name), Bytes::from(encoded), None).await;
            if let Ok(mut names) = self.names.write() {
                names.insert(name.to_string());
            }
        }
    }

    /// Snapshot of every archive name this process has observed an ETag
    /// for, for the invalidator's periodic poll.
    pub fn known_names(&self) -> Vec<String> {
        self.names.read().map(|n| n.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().map(|n| n.is_empty()).unwrap_or(true)
    }
}
