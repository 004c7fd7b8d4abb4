//! Group store: forest maintenance with parent validation

use crate::cache::Invalidator;
use crate::config::OrphanPolicy;
use crate::error::{AuthzError, Result};
use crate::hierarchy;
use crate::storage::Storage;
use crate::types::{Group, GroupId, GroupUpdate, NewGroup};
use std::sync::Arc;
use tracing::{debug, info};

/// Group CRUD; keeps parent links acyclic and evicts affected principals
#[derive(Clone)]
pub struct GroupStore {
    storage: Arc<dyn Storage>,
    invalidator: Invalidator,
    orphan_policy: OrphanPolicy,
}

impl GroupStore {
    pub fn new(storage: Arc<dyn Storage>, invalidator: Invalidator, orphan_policy: OrphanPolicy) -> Self {
        Self {
            storage,
            invalidator,
            orphan_policy,
        }
    }

    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    /// Create a group, optionally under an existing parent
    pub async fn create(&self, name: &str, parent: Option<GroupId>) -> Result<GroupId> {
        let mut group = NewGroup::new(name);
        group.parent_id = parent;
        self.create_with(group).await
    }

    pub async fn create_with(&self, mut group: NewGroup) -> Result<GroupId> {
        group.name = group.name.trim().to_string();
        if group.name.is_empty() {
            return Err(AuthzError::EmptyName);
        }
        if let Some(parent) = group.parent_id {
            self.require_parent(parent).await?;
        }

        // A fresh group has no members, grants or children; nothing to evict
        let created = self.storage.insert_group(&group).await?;
        info!(
            "Created group {} ({}) under {:?}",
            created.name, created.id, created.parent_id
        );
        Ok(created.id)
    }

    pub async fn read(&self, id: GroupId) -> Result<Option<Group>> {
        self.storage.group(id).await
    }

    /// First group with this name; names are not unique
    pub async fn read_by_name(&self, name: &str) -> Result<Option<Group>> {
        self.storage.group_by_name(name.trim()).await
    }

    /// All groups ordered by id
    pub async fn list(&self) -> Result<Vec<Group>> {
        self.storage.list_groups().await
    }

    /// Direct children of a group
    pub async fn children(&self, id: GroupId) -> Result<Vec<Group>> {
        let ids = self.storage.child_ids(&[id]).await?;
        let mut children = Vec::with_capacity(ids.len());
        for child in ids {
            if let Some(group) = self.storage.group(child).await? {
                children.push(group);
            }
        }
        children.sort_by_key(|g| g.id);
        Ok(children)
    }

    /// The whole forest depth-first as `(depth, group)`, roots first
    pub async fn tree(&self) -> Result<Vec<(usize, Group)>> {
        let groups = self.storage.list_groups().await?;
        Ok(hierarchy::forest_order(&groups)
            .into_iter()
            .map(|(depth, group)| (depth, group.clone()))
            .collect())
    }

    /// Rename, describe or move a group
    pub async fn update(&self, id: GroupId, update: GroupUpdate) -> Result<Group> {
        let mut group = self
            .storage
            .group(id)
            .await?
            .ok_or_else(|| AuthzError::group_not_found(id))?;

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AuthzError::EmptyName);
            }
            group.name = name.to_string();
        }
        if let Some(description) = update.description {
            group.description = description;
        }

        let moved = match update.parent_id {
            Some(parent) if parent != group.parent_id => {
                if let Some(parent) = parent {
                    self.require_parent(parent).await?;
                    if hierarchy::would_create_cycle(self.storage.as_ref(), id, parent).await? {
                        return Err(AuthzError::InvalidParent {
                            parent,
                            reason: format!("group {} is the group itself or one of its descendants", parent),
                        });
                    }
                }
                group.parent_id = parent;
                true
            }
            _ => false,
        };

        // Subtree members are collected under the old links; the subtree
        // itself does not change on a move, so this is also the new set
        let affected = if moved {
            self.invalidator.affected_by_groups(&[id]).await?
        } else {
            Default::default()
        };

        if !self.storage.update_group(&group).await? {
            return Err(AuthzError::group_not_found(id));
        }

        if moved {
            let evicted = self.invalidator.evict(&affected);
            info!(
                "Moved group {} under {:?} ({} principals evicted)",
                id, group.parent_id, evicted
            );
        } else {
            debug!("Updated group {}", id);
        }
        Ok(group)
    }

    /// Delete a group; children are re-linked according to the orphan policy
    pub async fn delete(&self, id: GroupId) -> Result<()> {
        let group = self
            .storage
            .group(id)
            .await?
            .ok_or_else(|| AuthzError::group_not_found(id))?;

        // Members and descendants lose inherited grants; collect them while
        // the links still exist
        let affected = self.invalidator.affected_by_groups(&[id]).await?;

        let new_parent = match self.orphan_policy {
            OrphanPolicy::ClearToRoot => None,
            OrphanPolicy::ReassignToGrandparent => group.parent_id,
        };
        self.storage.reparent_children(id, new_parent).await?;

        if !self.storage.delete_group(id).await? {
            return Err(AuthzError::group_not_found(id));
        }

        let evicted = self.invalidator.evict(&affected);
        info!(
            "Deleted group {} ({}), children moved to {:?}, {} principals evicted",
            group.name, id, new_parent, evicted
        );
        Ok(())
    }

    async fn require_parent(&self, parent: GroupId) -> Result<()> {
        if self.storage.group(parent).await?.is_none() {
            return Err(AuthzError::InvalidParent {
                parent,
                reason: "parent group does not exist".to_string(),
            });
        }
        Ok(())
    }
}
