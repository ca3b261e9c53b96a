//! Cache Layers: an abstract byte-oriented backend plus single-flight
//! coalescing, specialized into four typed keyspaces (archive body,
//! central index, HEAD metadata, ETag map).

pub mod layers;
pub mod provider;
pub mod single_flight;

pub use layers::{ArchiveCache, CachedHead, EtagEntry, EtagMap, HeadCache, IndexCache};
pub use provider::{CacheProvider, InMemoryCacheProvider};

use std::sync::Arc;

/// The four cache layers bundled together, all sitting on one provider.
pub struct Caches {
    pub archives: ArchiveCache,
    pub indexes: IndexCache,
    pub heads: HeadCache,
    pub etags: EtagMap,
}

impl Caches {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        Caches {
            archives: ArchiveCache::new(Arc::clone(&provider)),
            indexes: IndexCache::new(Arc::clone(&provider)),
            heads: HeadCache::new(Arc::clone(&provider)),
            etags: EtagMap::new(provider),
        }
    }
}
