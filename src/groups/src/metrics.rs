//! Resolver metrics collection

use parking_lot::RwLock;
use std::sync::Arc;

/// Resolver counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverMetrics {
    /// Total number of `can()` checks
    pub total_checks: u64,

    /// Checks answered with allow
    pub allowed_checks: u64,

    /// Checks answered with deny
    pub denied_checks: u64,

    /// Checks answered by the administrator override
    pub override_checks: u64,

    /// Effective-set lookups served from cache
    pub cache_hits: u64,

    /// Effective-set lookups that had to walk storage
    pub cache_misses: u64,

    /// Principals evicted by write operations
    pub evictions: u64,

    /// Walks that hit the round bound
    pub truncated_walks: u64,
}

impl ResolverMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_checks + self.denied_checks;
        if total == 0 {
            0.0
        } else {
            self.allowed_checks as f64 / total as f64
        }
    }
}

/// Shared metrics collector
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<ResolverMetrics>>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a check
    pub fn record_check(&self, allowed: bool) {
        let mut metrics = self.metrics.write();
        metrics.total_checks += 1;
        if allowed {
            metrics.allowed_checks += 1;
        } else {
            metrics.denied_checks += 1;
        }
    }

    /// Record a check granted by the administrator override
    pub fn record_override(&self) {
        self.metrics.write().override_checks += 1;
    }

    pub fn record_cache_hit(&self) {
        self.metrics.write().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.metrics.write().cache_misses += 1;
    }

    pub fn record_evictions(&self, count: usize) {
        self.metrics.write().evictions += count as u64;
    }

    pub fn record_truncated_walk(&self) {
        self.metrics.write().truncated_walks += 1;
    }

    /// Snapshot of the current counters
    pub fn snapshot(&self) -> ResolverMetrics {
        self.metrics.read().clone()
    }

    /// Reset all counters
    pub fn reset(&self) {
        *self.metrics.write() = ResolverMetrics::default();
    }
}
