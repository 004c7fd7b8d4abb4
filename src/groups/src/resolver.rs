//! Resolution engine: effective capability sets and `can()` checks
//!
//! A principal's effective set is resolved in three steps:
//!
//! ```text
//! user  ──memberships──▶ groups ──ancestors──▶ closure ──grants──▶ capabilities
//!   └───────────────────────direct grants─────────────────────────────▲
//! ```
//!
//! The three resulting sets (labels, capability ids, group ids) are cached
//! together per principal and evicted by the stores on write.

use crate::cache::{CacheStats, EffectiveEntry, PrincipalCache};
use crate::error::Result;
use crate::hierarchy;
use crate::metrics::MetricsCollector;
use crate::storage::Storage;
use crate::types::{Capability, CapabilityId, CapabilityRef, GroupId, Principal};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Externally supplied predicate identifying administrators
///
/// Only consulted when the administrator override is enabled in the
/// configuration.
pub trait SuperRole: Send + Sync {
    fn is_super(&self, principal: &Principal) -> bool;
}

impl<F> SuperRole for F
where
    F: Fn(&Principal) -> bool + Send + Sync,
{
    fn is_super(&self, principal: &Principal) -> bool {
        self(principal)
    }
}

/// Resolves and caches effective capability sets
#[derive(Clone)]
pub struct Resolver {
    storage: Arc<dyn Storage>,
    cache: PrincipalCache,
    admin_override: bool,
    super_role: Option<Arc<dyn SuperRole>>,
    metrics: Option<MetricsCollector>,
}

impl Resolver {
    pub fn new(storage: Arc<dyn Storage>, cache: PrincipalCache) -> Self {
        Self {
            storage,
            cache,
            admin_override: false,
            super_role: None,
            metrics: None,
        }
    }

    /// Enable the administrator override with the given predicate
    pub fn with_admin_override(mut self, enabled: bool, super_role: Option<Arc<dyn SuperRole>>) -> Self {
        self.admin_override = enabled;
        self.super_role = super_role;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Check whether `principal` holds `capability`
    ///
    /// Undefined, empty or unknown capability references and malformed
    /// principals yield `Ok(false)`. Only storage failures are errors.
    pub async fn can(&self, principal: &Principal, capability: impl Into<CapabilityRef>) -> Result<bool> {
        let capability = capability.into();

        if let Err(err) = principal.validate() {
            debug!("Denying check on malformed principal: {}", err);
            return Ok(self.record(false));
        }

        if self.is_overridden(principal) {
            debug!("Administrator override for {} on {}", principal, capability);
            if let Some(metrics) = &self.metrics {
                metrics.record_override();
            }
            return Ok(self.record(true));
        }

        let allowed = match &capability {
            CapabilityRef::Undefined => false,
            CapabilityRef::Id(id) => self.effective_entry(principal).await?.capability_ids.contains(id),
            CapabilityRef::Label(label) => {
                let label = label.trim();
                !label.is_empty() && self.effective_entry(principal).await?.labels.contains(label)
            }
        };

        debug!(
            "Check {} on {}: {}",
            principal,
            capability,
            if allowed { "allow" } else { "deny" }
        );
        Ok(self.record(allowed))
    }

    /// Effective capability labels
    pub async fn capabilities(&self, principal: &Principal) -> Result<Arc<BTreeSet<String>>> {
        Ok(self.effective_entry(principal).await?.labels)
    }

    /// Effective capability ids
    pub async fn capability_ids(&self, principal: &Principal) -> Result<Arc<BTreeSet<CapabilityId>>> {
        Ok(self.effective_entry(principal).await?.capability_ids)
    }

    /// Groups whose grants flow to the principal: a user's memberships plus
    /// their ancestors, or a group together with its ancestors
    pub async fn group_ids(&self, principal: &Principal) -> Result<Arc<BTreeSet<GroupId>>> {
        Ok(self.effective_entry(principal).await?.group_ids)
    }

    /// Full capability records, ordered by id
    pub async fn effective_capabilities(&self, principal: &Principal) -> Result<Vec<Capability>> {
        let ids: Vec<_> = self.capability_ids(principal).await?.iter().copied().collect();
        self.storage.capabilities_by_ids(&ids).await
    }

    /// All three sets of a principal, from cache or freshly resolved
    pub async fn effective_entry(&self, principal: &Principal) -> Result<EffectiveEntry> {
        if principal.validate().is_err() {
            return Ok(EffectiveEntry::default());
        }

        if let Some(entry) = self.cache.load(principal) {
            debug!("Effective set cache hit for {}", principal);
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit();
            }
            return Ok(entry);
        }

        debug!("Effective set cache miss for {}", principal);
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss();
        }

        let generation = self.cache.generation();
        let (entry, cacheable) = self.resolve(principal).await?;
        if cacheable && !self.cache.store_if_current(principal, &entry, generation) {
            debug!("Discarded fill for {}: evicted while resolving", principal);
        }
        Ok(entry)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Walk storage for a principal's sets; the flag is false when the
    /// result must not be cached
    async fn resolve(&self, principal: &Principal) -> Result<(EffectiveEntry, bool)> {
        let storage = self.storage.as_ref();

        let (seed, mut capability_ids) = match principal {
            Principal::User(user) => {
                let groups = storage.user_group_ids(*user).await?;
                let direct: BTreeSet<_> = storage.user_capability_ids(*user).await?.into_iter().collect();
                (groups, direct)
            }
            Principal::Group(group) => {
                // An unknown group may be created later under a parent with
                // grants, so its empty set is not cached
                if storage.group(*group).await?.is_none() {
                    return Ok((EffectiveEntry::default(), false));
                }
                (vec![*group], BTreeSet::new())
            }
        };

        let closure = hierarchy::ancestors(storage, &seed).await?;
        if closure.truncated {
            if let Some(metrics) = &self.metrics {
                metrics.record_truncated_walk();
            }
        }

        capability_ids.extend(storage.group_capability_ids(&closure.to_vec()).await?);

        let ids: Vec<_> = capability_ids.iter().copied().collect();
        let labels: BTreeSet<String> = storage
            .capabilities_by_ids(&ids)
            .await?
            .into_iter()
            .map(|capability| capability.label)
            .collect();

        debug!(
            "Resolved {}: {} capabilities across {} groups",
            principal,
            capability_ids.len(),
            closure.ids.len()
        );

        Ok((
            EffectiveEntry {
                labels: Arc::new(labels),
                capability_ids: Arc::new(capability_ids),
                group_ids: Arc::new(closure.ids),
            },
            true,
        ))
    }

    fn is_overridden(&self, principal: &Principal) -> bool {
        self.admin_override
            && self
                .super_role
                .as_ref()
                .is_some_and(|role| role.is_super(principal))
    }

    fn record(&self, allowed: bool) -> bool {
        if let Some(metrics) = &self.metrics {
            metrics.record_check(allowed);
        }
        allowed
    }
}
