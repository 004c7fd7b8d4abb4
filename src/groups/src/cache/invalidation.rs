//! Mutation-driven eviction
//!
//! Writers compute the set of affected principals while the data that links
//! them is still present (before a delete), perform the write, then evict.

use super::PrincipalCache;
use crate::error::Result;
use crate::hierarchy;
use crate::metrics::MetricsCollector;
use crate::storage::Storage;
use crate::types::{CapabilityId, GroupId, Principal, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Computes and evicts the principals affected by a write
#[derive(Clone)]
pub struct Invalidator {
    storage: Arc<dyn Storage>,
    cache: PrincipalCache,
    metrics: Option<MetricsCollector>,
}

impl Invalidator {
    pub fn new(storage: Arc<dyn Storage>, cache: PrincipalCache, metrics: Option<MetricsCollector>) -> Self {
        Self {
            storage,
            cache,
            metrics,
        }
    }

    /// Principals whose effective set depends on any of `groups`: every
    /// descendant group (the seeds included) and every direct member of one
    /// of those groups.
    pub async fn affected_by_groups(&self, groups: &[GroupId]) -> Result<BTreeSet<Principal>> {
        let mut affected = BTreeSet::new();
        if groups.is_empty() {
            return Ok(affected);
        }

        let closure = hierarchy::descendants(self.storage.as_ref(), groups).await?;
        if closure.truncated {
            if let Some(metrics) = &self.metrics {
                metrics.record_truncated_walk();
            }
        }

        let members = self.storage.member_ids(&closure.to_vec()).await?;
        affected.extend(closure.ids.iter().copied().map(Principal::Group));
        affected.extend(members.into_iter().map(Principal::User));
        Ok(affected)
    }

    /// Principals holding `capability` directly or through a granting group
    pub async fn affected_by_capability(&self, capability: CapabilityId) -> Result<BTreeSet<Principal>> {
        let users = self.storage.users_with_capability(capability).await?;
        let groups = self.storage.groups_with_capability(capability).await?;

        let mut affected = self.affected_by_groups(&groups).await?;
        affected.extend(users.into_iter().map(Principal::User));
        Ok(affected)
    }

    /// Evict the given principals; returns how many had cached entries
    pub fn evict(&self, principals: &BTreeSet<Principal>) -> usize {
        let evicted = principals
            .iter()
            .filter(|principal| self.cache.evict(principal))
            .count();

        if let Some(metrics) = &self.metrics {
            metrics.record_evictions(evicted);
        }
        debug!(
            "Evicted {} of {} affected principals",
            evicted,
            principals.len()
        );
        evicted
    }

    /// A user's own grants or memberships changed
    pub fn user_changed(&self, user: UserId) -> usize {
        self.evict(&BTreeSet::from([Principal::User(user)]))
    }

    /// A group's grants or position in the forest changed
    pub async fn group_changed(&self, group: GroupId) -> Result<usize> {
        let affected = self.affected_by_groups(&[group]).await?;
        Ok(self.evict(&affected))
    }

    /// Drop every cached entry
    pub fn flush(&self) {
        debug!("Flushing effective-set cache");
        self.cache.flush();
    }
}
