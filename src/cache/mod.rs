//! Caching subsystem.
//!
//! Three cooperating pieces:
//!
//! - [`disk::DiskCacheStore`]: the durable, write-once patch files behind
//!   the [`PatchStore`] trait. The only component that writes to the cache
//!   directory.
//!
//! - [`PatchMemory`]: optional bounded in-memory tier in front of the
//!   disk store, so hot patches are served without touching the
//!   filesystem.
//!
//! - [`inflight::InFlight`]: single-flight map that lets concurrent
//!   requests for the same missing key share one generation.

pub mod disk;
pub mod inflight;

pub use disk::{DiskCacheStore, PatchStore};
pub use inflight::InFlight;

use std::sync::Arc;

use crate::types::CacheKey;

/// Bounded in-memory LRU of patch text keyed on [`CacheKey`].
///
/// Patches for a key never change once written, so entries carry no TTL.
pub struct PatchMemory {
    entries: moka::future::Cache<CacheKey, Arc<str>>,
}

impl PatchMemory {
    /// Create a cache holding at most `max_entries` patches.
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: moka::future::Cache::new(max_entries),
        }
    }

    /// Look up a patch. Returns `None` on cache miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, patch: Arc<str>) {
        self.entries.insert(key, patch).await;
    }

    /// Number of entries currently in the cache.
    ///
    /// Approximate until pending maintenance tasks have run.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
