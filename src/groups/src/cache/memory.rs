//! Unbounded concurrent cache backed by DashMap

use super::{CacheStats, CachedValue, ObjectCache};
use dashmap::DashMap;
use std::sync::Arc;

/// Unbounded in-memory cache
///
/// Thread-safe and lock-free for readers. Entries live until deleted or
/// flushed.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CachedValue>>,

    /// Cache statistics
    stats: Arc<DashMap<&'static str, usize>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl ObjectCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        match self.entries.get(key) {
            Some(entry) => {
                self.increment_stat("hits");
                Some(entry.value().clone())
            }
            None => {
                self.increment_stat("misses");
                None
            }
        }
    }

    fn set(&self, key: &str, value: CachedValue) {
        self.entries.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn flush(&self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            entries: self.entries.len(),
            capacity: None,
        }
    }
}
