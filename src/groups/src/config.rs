//! Resolver configuration

use crate::cache::{LruObjectCache, MemoryCache, ObjectCache};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// What happens to the children of a deleted group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Children become roots
    #[default]
    ClearToRoot,
    /// Children move up to the deleted group's parent
    ReassignToGrandparent,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// DashMap, no eviction besides invalidation
    #[default]
    Unbounded,
    /// LRU with a fixed number of entries
    Lru,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend implementation
    pub backend: CacheBackend,

    /// Maximum number of entries (LRU backend only)
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Unbounded,
            capacity: 10_000,
        }
    }
}

impl CacheConfig {
    /// Build the configured cache
    pub fn build(&self) -> Arc<dyn ObjectCache> {
        match self.backend {
            CacheBackend::Unbounded => Arc::new(MemoryCache::new()),
            CacheBackend::Lru => Arc::new(LruObjectCache::new(self.capacity)),
        }
    }
}

/// Resolver configuration
///
/// ```toml
/// admin_override = true
/// orphan_policy = "reassign_to_grandparent"
///
/// [cache]
/// backend = "lru"
/// capacity = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Let principals matched by the super-role predicate pass every check
    pub admin_override: bool,

    /// Child re-linking on group deletion
    pub orphan_policy: OrphanPolicy,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Disable to skip metrics collection entirely
    pub enable_metrics: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_override: false,
            orphan_policy: OrphanPolicy::ClearToRoot,
            cache: CacheConfig::default(),
            enable_metrics: true,
        }
    }
}

impl AuthzConfig {
    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn with_admin_override(mut self, enabled: bool) -> Self {
        self.admin_override = enabled;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
