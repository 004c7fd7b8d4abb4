//! Capacity-bounded LRU cache

use super::{CacheStats, CachedValue, ObjectCache};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_CAPACITY: usize = 10_000;

/// LRU cache for deployments that must cap memory
///
/// Evicting an entry for capacity only costs a recomputation on the next
/// read, so a bounded cache never serves stale data.
pub struct LruObjectCache {
    entries: Mutex<LruCache<String, CachedValue>>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl LruObjectCache {
    /// Create a new cache with the specified capacity (0 falls back to the default)
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectCache for LruObjectCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        let value = self.entries.lock().get(key).cloned();
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn set(&self, key: &str, value: CachedValue) {
        self.entries.lock().put(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    fn flush(&self) {
        self.entries.lock().clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: Some(self.capacity),
        }
    }
}
