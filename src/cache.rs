//! Read-through / write-through cache over a [`Store`].
//!
//! Each resource id gets its own entry with its own read/write lock. Fills
//! and writes take the lock exclusively, so concurrent first readers collapse
//! into a single store fetch and writes to one id never overlap. Ids never
//! contend with each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE, STORE_ERRORS, STORE_FETCHES, STORE_WRITES};
use crate::store::Store;

// Cached value for one resource. `None` until the first successful fill or write.
struct CacheEntry<V> {
    value: RwLock<Option<V>>,
}

impl<V> CacheEntry<V> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }
}

pub struct Cache<S: Store> {
    store: S,
    entries: DashMap<String, Arc<CacheEntry<S::Value>>>,
}

impl<S: Store> Cache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of resource ids the cache knows about, filled or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value for `id`, fetching it from the store on first
    /// access.
    ///
    /// Concurrent first readers of the same id cause exactly one fetch. A
    /// failed fetch leaves the entry unfilled and the error goes to the
    /// caller that performed it; the next reader tries again.
    pub async fn get_resource(&self, id: &str) -> Result<S::Value, StoreError> {
        let entry = self.entry(id);

        if let Some(value) = entry.value.read().await.as_ref() {
            CACHE_HITS.inc();
            return Ok(value.clone());
        }

        let mut slot = entry.value.write().await;
        // someone else may have filled it while we waited for the lock
        if let Some(value) = slot.as_ref() {
            CACHE_HITS.inc();
            return Ok(value.clone());
        }

        CACHE_MISSES.inc();
        STORE_FETCHES.inc();
        let value = self.store.fetch(id).await.inspect_err(|err| {
            STORE_ERRORS.inc();
            warn!(id, error = %err, "store fetch failed");
        })?;
        debug!(id, "cache entry filled from store");
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Write `value` to the store, then cache it.
    ///
    /// Holds the entry exclusively for the whole write, so writes to one id
    /// are applied one at a time, in the order the lock is granted, and
    /// readers of that id wait. On a store
    /// error the cached value is left as it was.
    pub async fn add_or_update_resource(&self, id: &str, value: S::Value) -> Result<(), StoreError> {
        let entry = self.entry(id);
        let mut slot = entry.value.write().await;

        STORE_WRITES.inc();
        self.store.write(id, &value).await.inspect_err(|err| {
            STORE_ERRORS.inc();
            warn!(id, error = %err, "store write failed");
        })?;
        *slot = Some(value);
        debug!(id, "resource written through");
        Ok(())
    }

    fn entry(&self, id: &str) -> Arc<CacheEntry<S::Value>> {
        if let Some(entry) = self.entries.get(id) {
            return Arc::clone(entry.value());
        }
        let entry = Arc::clone(
            self.entries
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(CacheEntry::new()))
                .value(),
        );
        CACHE_SIZE.set(self.entries.len() as f64);
        entry
    }
}
