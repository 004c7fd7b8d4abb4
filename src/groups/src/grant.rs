//! Direct grants and group memberships

use crate::cache::Invalidator;
use crate::error::{AuthzError, Result};
use crate::storage::Storage;
use crate::types::{CapabilityId, GroupId, Principal, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// Maintains the user→capability, group→capability and user→group relations
///
/// Every method is idempotent: adding an existing pair or removing a missing
/// one returns `Ok(false)` without touching the cache.
#[derive(Clone)]
pub struct GrantStore {
    storage: Arc<dyn Storage>,
    invalidator: Invalidator,
}

impl GrantStore {
    pub fn new(storage: Arc<dyn Storage>, invalidator: Invalidator) -> Self {
        Self {
            storage,
            invalidator,
        }
    }

    pub async fn add_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool> {
        validate_user(user)?;
        self.require_capability(capability).await?;

        let added = self.storage.insert_user_capability(user, capability).await?;
        if added {
            self.invalidator.user_changed(user);
            debug!("Granted capability {} to user {}", capability, user);
        }
        Ok(added)
    }

    pub async fn remove_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool> {
        validate_user(user)?;

        let removed = self.storage.delete_user_capability(user, capability).await?;
        if removed {
            self.invalidator.user_changed(user);
            debug!("Revoked capability {} from user {}", capability, user);
        }
        Ok(removed)
    }

    /// Grant to a group; the group and all its descendants' members are evicted
    pub async fn add_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool> {
        self.require_group(group).await?;
        self.require_capability(capability).await?;

        let added = self.storage.insert_group_capability(group, capability).await?;
        if added {
            let evicted = self.invalidator.group_changed(group).await?;
            debug!(
                "Granted capability {} to group {} ({} principals evicted)",
                capability, group, evicted
            );
        }
        Ok(added)
    }

    pub async fn remove_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool> {
        let removed = self.storage.delete_group_capability(group, capability).await?;
        if removed {
            let evicted = self.invalidator.group_changed(group).await?;
            debug!(
                "Revoked capability {} from group {} ({} principals evicted)",
                capability, group, evicted
            );
        }
        Ok(removed)
    }

    pub async fn add_member(&self, user: UserId, group: GroupId) -> Result<bool> {
        validate_user(user)?;
        self.require_group(group).await?;

        let added = self.storage.insert_membership(user, group).await?;
        if added {
            self.invalidator.user_changed(user);
            debug!("Added user {} to group {}", user, group);
        }
        Ok(added)
    }

    pub async fn remove_member(&self, user: UserId, group: GroupId) -> Result<bool> {
        validate_user(user)?;

        let removed = self.storage.delete_membership(user, group).await?;
        if removed {
            self.invalidator.user_changed(user);
            debug!("Removed user {} from group {}", user, group);
        }
        Ok(removed)
    }

    /// True if the user is a direct member of the group
    pub async fn is_member(&self, user: UserId, group: GroupId) -> Result<bool> {
        Ok(self.storage.user_group_ids(user).await?.contains(&group))
    }

    /// Groups the user belongs to directly, ordered by id
    pub async fn user_group_ids(&self, user: UserId) -> Result<Vec<GroupId>> {
        let mut ids = self.storage.user_group_ids(user).await?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Capabilities granted directly to the user, ordered by id
    pub async fn user_capability_ids(&self, user: UserId) -> Result<Vec<CapabilityId>> {
        let mut ids = self.storage.user_capability_ids(user).await?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Capabilities granted directly to the group, ordered by id
    pub async fn group_capability_ids(&self, group: GroupId) -> Result<Vec<CapabilityId>> {
        let mut ids = self.storage.group_capability_ids(&[group]).await?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Drop every membership and direct grant of a user leaving the system
    pub async fn purge_user(&self, user: UserId) -> Result<()> {
        validate_user(user)?;
        self.storage.delete_user(user).await?;
        self.invalidator.user_changed(user);
        info!("Purged user {}", user);
        Ok(())
    }

    async fn require_capability(&self, id: CapabilityId) -> Result<()> {
        match self.storage.capability(id).await? {
            Some(_) => Ok(()),
            None => Err(AuthzError::capability_not_found(id)),
        }
    }

    async fn require_group(&self, id: GroupId) -> Result<()> {
        match self.storage.group(id).await? {
            Some(_) => Ok(()),
            None => Err(AuthzError::group_not_found(id)),
        }
    }
}

fn validate_user(user: UserId) -> Result<()> {
    Principal::User(user).validate()
}
