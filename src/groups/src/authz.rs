//! Facade wiring storage, cache and configuration into the stores

use crate::cache::{CacheStats, Invalidator, PrincipalCache};
use crate::capability::CapabilityStore;
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::grant::GrantStore;
use crate::group::GroupStore;
use crate::metrics::{MetricsCollector, ResolverMetrics};
use crate::resolver::{Resolver, SuperRole};
use crate::storage::{InMemoryStorage, Storage};
use crate::types::{Capability, CapabilityRef, Principal};
use std::sync::Arc;
use tracing::info;

/// One storage handle, one cache, three stores and a resolver
///
/// ```text
/// CapabilityStore ─┐
/// GroupStore ──────┼──▶ Storage
/// GrantStore ──────┘       ▲
///      │ evict             │ walk on miss
///      ▼                   │
/// PrincipalCache ◀──── Resolver ──▶ can()
/// ```
#[derive(Clone)]
pub struct Authz {
    capabilities: CapabilityStore,
    groups: GroupStore,
    grants: GrantStore,
    resolver: Resolver,
    invalidator: Invalidator,
    metrics: Option<MetricsCollector>,
    config: AuthzConfig,
}

impl Authz {
    /// Wire every component over the given storage backend
    pub fn new(config: AuthzConfig, storage: Arc<dyn Storage>) -> Self {
        let cache = PrincipalCache::new(config.cache.build());
        let metrics = config.enable_metrics.then(MetricsCollector::new);

        let invalidator = Invalidator::new(storage.clone(), cache.clone(), metrics.clone());
        let capabilities = CapabilityStore::new(storage.clone(), invalidator.clone());
        let groups = GroupStore::new(storage.clone(), invalidator.clone(), config.orphan_policy);
        let grants = GrantStore::new(storage.clone(), invalidator.clone());
        let resolver = Resolver::new(storage, cache)
            .with_admin_override(config.admin_override, None)
            .with_metrics(metrics.clone());

        info!(
            "Authz initialized with cache={:?}, orphan_policy={:?}, admin_override={}, metrics={}",
            config.cache.backend, config.orphan_policy, config.admin_override, config.enable_metrics
        );

        Self {
            capabilities,
            groups,
            grants,
            resolver,
            invalidator,
            metrics,
            config,
        }
    }

    /// Facade over a fresh in-memory backend
    pub fn in_memory(config: AuthzConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStorage::new()))
    }

    /// Install the predicate consulted by the administrator override
    pub fn with_super_role(mut self, super_role: Arc<dyn SuperRole>) -> Self {
        self.resolver = self
            .resolver
            .with_admin_override(self.config.admin_override, Some(super_role));
        self
    }

    pub fn capabilities(&self) -> &CapabilityStore {
        &self.capabilities
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    pub fn grants(&self) -> &GrantStore {
        &self.grants
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Check whether `principal` holds `capability`
    pub async fn can(&self, principal: &Principal, capability: impl Into<CapabilityRef>) -> Result<bool> {
        self.resolver.can(principal, capability).await
    }

    /// Effective capability records of `principal`, ordered by id
    pub async fn effective_capabilities(&self, principal: &Principal) -> Result<Vec<Capability>> {
        self.resolver.effective_capabilities(principal).await
    }

    /// Parse `user:<id>`, `group:<id>` or `group:<name>`
    pub async fn lookup_principal(&self, input: &str) -> Result<Principal> {
        if let Ok(principal) = input.parse::<Principal>() {
            return Ok(principal);
        }
        match input.trim().split_once(':') {
            Some(("group", name)) if !name.trim().is_empty() => self
                .groups
                .read_by_name(name)
                .await?
                .map(|group| Principal::Group(group.id))
                .ok_or_else(|| AuthzError::NotFound(format!("group named '{}'", name.trim()))),
            _ => Err(AuthzError::InvalidPrincipal(input.to_string())),
        }
    }

    /// Metrics snapshot, `None` when metrics are disabled
    pub fn metrics(&self) -> Option<ResolverMetrics> {
        self.metrics.as_ref().map(MetricsCollector::snapshot)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }

    /// Drop every cached effective set
    pub fn flush_cache(&self) {
        self.invalidator.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wiring_shares_one_cache() {
        let authz = Authz::in_memory(AuthzConfig::default());
        let dance = authz.capabilities().create("dance").await.unwrap();
        let fruits = authz.groups().create("Fruits", None).await.unwrap();
        authz.grants().add_member(1, fruits).await.unwrap();

        let user = Principal::User(1);
        assert!(!authz.can(&user, "dance").await.unwrap());
        assert_eq!(authz.cache_stats().entries, 3);

        // The grant evicts through the same cache the resolver filled
        authz.grants().add_group_capability(fruits, dance).await.unwrap();
        assert_eq!(authz.cache_stats().entries, 0);
        assert!(authz.can(&user, "dance").await.unwrap());

        authz.flush_cache();
        assert_eq!(authz.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_metrics_toggle() {
        let authz = Authz::in_memory(AuthzConfig::default());
        authz.can(&Principal::User(1), "dance").await.unwrap();
        assert_eq!(authz.metrics().unwrap().denied_checks, 1);

        let config = AuthzConfig {
            enable_metrics: false,
            ..Default::default()
        };
        assert!(Authz::in_memory(config).metrics().is_none());
    }

    #[tokio::test]
    async fn test_lookup_principal() {
        let authz = Authz::in_memory(AuthzConfig::default());
        let sour = authz.groups().create("Sour", None).await.unwrap();

        assert_eq!(authz.lookup_principal("user:4").await.unwrap(), Principal::User(4));
        assert_eq!(authz.lookup_principal("group:Sour").await.unwrap(), Principal::Group(sour));
        assert_eq!(
            authz.lookup_principal(&format!("group:{}", sour)).await.unwrap(),
            Principal::Group(sour)
        );
        assert!(matches!(
            authz.lookup_principal("group:Lemon").await,
            Err(AuthzError::NotFound(_))
        ));
        assert!(matches!(
            authz.lookup_principal("user:alice").await,
            Err(AuthzError::InvalidPrincipal(_))
        ));
    }

    #[tokio::test]
    async fn test_super_role_requires_flag() {
        let admins: Arc<dyn SuperRole> = Arc::new(|p: &Principal| p.id() == 1);

        let authz = Authz::in_memory(AuthzConfig::default()).with_super_role(admins.clone());
        assert!(!authz.can(&Principal::User(1), "dance").await.unwrap());

        let authz = Authz::in_memory(AuthzConfig::default().with_admin_override(true)).with_super_role(admins);
        assert!(authz.can(&Principal::User(1), "dance").await.unwrap());
        assert_eq!(authz.metrics().unwrap().override_checks, 1);
    }
}
