//! Process-wide effective-set cache and its invalidation
//!
//! The cache is a plain string-keyed store with explicit delete and no TTL.
//! Entries are namespaced by kind and principal:
//!
//! ```text
//! groups:capabilities:user:7     -> {"dance", "sing"}
//! groups:capability_ids:user:7   -> {1, 2}
//! groups:group_ids:group:3       -> {1, 3}
//! ```
//!
//! A principal's entries are either absent or valid. Reads on an absent
//! entry recompute and store it; any write that could change the effective
//! set evicts all three entries of every affected principal.
//!
//! Evictions bump a generation counter. A fill records the generation before
//! reading storage and is discarded if any eviction happened since, so a set
//! computed from pre-write data never outlives the write's eviction.

mod invalidation;
mod bounded;
mod memory;

pub use self::invalidation::Invalidator;
pub use self::bounded::LruObjectCache;
pub use self::memory::MemoryCache;

use crate::types::{CapabilityId, GroupId, Principal};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of cached set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Effective capability labels
    Capabilities,
    /// Effective capability ids
    CapabilityIds,
    /// Groups in the principal's ancestor closure
    GroupIds,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [
        CacheKind::Capabilities,
        CacheKind::CapabilityIds,
        CacheKind::GroupIds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Capabilities => "capabilities",
            CacheKind::CapabilityIds => "capability_ids",
            CacheKind::GroupIds => "group_ids",
        }
    }
}

/// Namespaced cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub principal: Principal,
}

impl CacheKey {
    pub fn new(kind: CacheKind, principal: Principal) -> Self {
        Self { kind, principal }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "groups:{}:{}", self.kind.as_str(), self.principal)
    }
}

/// Cached value; sets are shared so hits never copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Labels(Arc<BTreeSet<String>>),
    Ids(Arc<BTreeSet<i64>>),
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    /// `None` for unbounded caches
    pub capacity: Option<usize>,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// String-keyed cache shared by every resolver in the process
pub trait ObjectCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedValue>;

    fn set(&self, key: &str, value: CachedValue);

    /// Returns true if an entry was removed
    fn delete(&self, key: &str) -> bool;

    /// Remove every entry
    fn flush(&self);

    fn stats(&self) -> CacheStats;
}

/// Typed view of an [`ObjectCache`] keyed by principal
#[derive(Clone)]
pub struct PrincipalCache {
    inner: Arc<dyn ObjectCache>,
    generation: Arc<AtomicU64>,
}

impl PrincipalCache {
    pub fn new(inner: Arc<dyn ObjectCache>) -> Self {
        Self {
            inner,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current eviction generation; read it before resolving a fill
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn capabilities(&self, principal: &Principal) -> Option<Arc<BTreeSet<String>>> {
        match self.inner.get(&CacheKey::new(CacheKind::Capabilities, *principal).to_string()) {
            Some(CachedValue::Labels(labels)) => Some(labels),
            _ => None,
        }
    }

    pub fn capability_ids(&self, principal: &Principal) -> Option<Arc<BTreeSet<CapabilityId>>> {
        self.ids(CacheKind::CapabilityIds, principal)
    }

    pub fn group_ids(&self, principal: &Principal) -> Option<Arc<BTreeSet<GroupId>>> {
        self.ids(CacheKind::GroupIds, principal)
    }

    fn ids(&self, kind: CacheKind, principal: &Principal) -> Option<Arc<BTreeSet<i64>>> {
        match self.inner.get(&CacheKey::new(kind, *principal).to_string()) {
            Some(CachedValue::Ids(ids)) => Some(ids),
            _ => None,
        }
    }

    /// Store all three sets of a principal
    pub fn store(&self, principal: &Principal, entry: &EffectiveEntry) {
        self.inner.set(
            &CacheKey::new(CacheKind::Capabilities, *principal).to_string(),
            CachedValue::Labels(entry.labels.clone()),
        );
        self.inner.set(
            &CacheKey::new(CacheKind::CapabilityIds, *principal).to_string(),
            CachedValue::Ids(entry.capability_ids.clone()),
        );
        self.inner.set(
            &CacheKey::new(CacheKind::GroupIds, *principal).to_string(),
            CachedValue::Ids(entry.group_ids.clone()),
        );
    }

    /// Store a fill computed at `generation`, unless an eviction has run
    /// since. Returns true if the entry was kept.
    pub fn store_if_current(&self, principal: &Principal, entry: &EffectiveEntry, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.store(principal, entry);

        // An eviction that ran between the check and the store may have
        // deleted before we wrote
        if self.generation() != generation {
            self.remove(principal);
            return false;
        }
        true
    }

    /// All three sets, only if every one of them is present
    pub fn load(&self, principal: &Principal) -> Option<EffectiveEntry> {
        Some(EffectiveEntry {
            labels: self.capabilities(principal)?,
            capability_ids: self.capability_ids(principal)?,
            group_ids: self.group_ids(principal)?,
        })
    }

    /// Drop every entry of a principal; true if anything was cached
    pub fn evict(&self, principal: &Principal) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.remove(principal)
    }

    fn remove(&self, principal: &Principal) -> bool {
        CacheKind::ALL
            .iter()
            .map(|kind| self.inner.delete(&CacheKey::new(*kind, *principal).to_string()))
            .fold(false, |any, removed| any || removed)
    }

    pub fn flush(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.flush();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// The three cached sets of one principal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveEntry {
    pub labels: Arc<BTreeSet<String>>,
    pub capability_ids: Arc<BTreeSet<CapabilityId>>,
    pub group_ids: Arc<BTreeSet<GroupId>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(labels: &[&str], ids: &[i64], groups: &[i64]) -> EffectiveEntry {
        EffectiveEntry {
            labels: Arc::new(labels.iter().map(|l| l.to_string()).collect()),
            capability_ids: Arc::new(ids.iter().copied().collect()),
            group_ids: Arc::new(groups.iter().copied().collect()),
        }
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::new(CacheKind::CapabilityIds, Principal::User(7));
        assert_eq!(key.to_string(), "groups:capability_ids:user:7");
        let key = CacheKey::new(CacheKind::GroupIds, Principal::Group(3));
        assert_eq!(key.to_string(), "groups:group_ids:group:3");
    }

    #[test]
    fn test_principal_cache_roundtrip_and_evict() {
        let cache = PrincipalCache::new(Arc::new(MemoryCache::new()));
        let user = Principal::User(1);
        let group = Principal::Group(1);

        assert!(cache.load(&user).is_none());
        cache.store(&user, &entry(&["dance"], &[1], &[2, 3]));
        cache.store(&group, &entry(&["sing"], &[2], &[1]));

        let loaded = cache.load(&user).unwrap();
        assert!(loaded.labels.contains("dance"));
        assert_eq!(loaded.group_ids.len(), 2);

        // User 1 and group 1 must not collide
        assert!(cache.capabilities(&group).unwrap().contains("sing"));

        assert!(cache.evict(&user));
        assert!(cache.load(&user).is_none());
        assert!(!cache.evict(&user));
        assert!(cache.load(&group).is_some());
    }

    #[test]
    fn test_fill_discarded_after_eviction() {
        let cache = PrincipalCache::new(Arc::new(MemoryCache::new()));
        let user = Principal::User(4);

        let before = cache.generation();
        cache.evict(&Principal::User(5));
        assert!(!cache.store_if_current(&user, &entry(&["stale"], &[1], &[]), before));
        assert!(cache.load(&user).is_none());

        let current = cache.generation();
        assert!(cache.store_if_current(&user, &entry(&["fresh"], &[1], &[]), current));
        assert!(cache.capabilities(&user).unwrap().contains("fresh"));

        cache.flush();
        assert_ne!(cache.generation(), current);
    }

    #[test]
    fn test_partial_entry_is_a_miss() {
        let inner = Arc::new(MemoryCache::new());
        let cache = PrincipalCache::new(inner.clone());
        let user = Principal::User(9);

        cache.store(&user, &entry(&["a"], &[1], &[]));
        inner.delete(&CacheKey::new(CacheKind::GroupIds, user).to_string());
        assert!(cache.load(&user).is_none());
    }
}
