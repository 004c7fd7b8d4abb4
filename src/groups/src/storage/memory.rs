//! In-memory storage backend

use super::Storage;
use crate::error::{AuthzError, Result};
use crate::types::{Capability, CapabilityId, Group, GroupId, NewGroup, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    next_capability_id: CapabilityId,
    next_group_id: GroupId,
    capabilities: BTreeMap<CapabilityId, Capability>,
    groups: BTreeMap<GroupId, Group>,
    memberships: BTreeSet<(UserId, GroupId)>,
    user_grants: BTreeSet<(UserId, CapabilityId)>,
    group_grants: BTreeSet<(GroupId, CapabilityId)>,
}

/// In-memory storage with table-level locking
///
/// Ids start at 1 and are never reused.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert_capability(&self, label: &str, description: Option<&str>) -> Result<Capability> {
        let mut tables = self.tables.write().await;
        if tables.capabilities.values().any(|c| c.label == label) {
            return Err(AuthzError::DuplicateLabel(label.to_string()));
        }
        tables.next_capability_id += 1;

        let capability = Capability {
            id: tables.next_capability_id,
            label: label.to_string(),
            description: description.map(str::to_string),
        };
        tables.capabilities.insert(capability.id, capability.clone());
        Ok(capability)
    }

    async fn capability(&self, id: CapabilityId) -> Result<Option<Capability>> {
        let tables = self.tables.read().await;
        Ok(tables.capabilities.get(&id).cloned())
    }

    async fn capability_by_label(&self, label: &str) -> Result<Option<Capability>> {
        let tables = self.tables.read().await;
        Ok(tables
            .capabilities
            .values()
            .find(|c| c.label == label)
            .cloned())
    }

    async fn capabilities_by_ids(&self, ids: &[CapabilityId]) -> Result<Vec<Capability>> {
        let tables = self.tables.read().await;
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| tables.capabilities.get(&id).cloned())
            .collect())
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>> {
        let tables = self.tables.read().await;
        Ok(tables.capabilities.values().cloned().collect())
    }

    async fn delete_capability(&self, id: CapabilityId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.capabilities.remove(&id).is_none() {
            return Ok(false);
        }
        tables.user_grants.retain(|(_, capability)| *capability != id);
        tables.group_grants.retain(|(_, capability)| *capability != id);
        Ok(true)
    }

    async fn insert_group(&self, group: &NewGroup) -> Result<Group> {
        let mut tables = self.tables.write().await;
        if let Some(parent) = group.parent_id {
            if !tables.groups.contains_key(&parent) {
                return Err(AuthzError::InvalidParent {
                    parent,
                    reason: "parent group does not exist".to_string(),
                });
            }
        }
        tables.next_group_id += 1;

        let group = Group {
            id: tables.next_group_id,
            name: group.name.clone(),
            description: group.description.clone(),
            parent_id: group.parent_id,
            created_at: Utc::now(),
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn group(&self, id: GroupId) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.get(&id).cloned())
    }

    async fn group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().find(|g| g.name == name).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().cloned().collect())
    }

    async fn group_count(&self) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.groups.len())
    }

    async fn update_group(&self, group: &Group) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.groups.get_mut(&group.id) {
            Some(existing) => {
                existing.name = group.name.clone();
                existing.description = group.description.clone();
                existing.parent_id = group.parent_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reparent_children(&self, parent: GroupId, new_parent: Option<GroupId>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for group in tables.groups.values_mut() {
            if group.parent_id == Some(parent) {
                group.parent_id = new_parent;
            }
        }
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.groups.remove(&id).is_none() {
            return Ok(false);
        }
        tables.memberships.retain(|(_, group)| *group != id);
        tables.group_grants.retain(|(group, _)| *group != id);
        // Mirrors ON DELETE SET NULL for any child the caller left behind
        for group in tables.groups.values_mut() {
            if group.parent_id == Some(id) {
                group.parent_id = None;
            }
        }
        Ok(true)
    }

    async fn parent_ids(&self, ids: &[GroupId]) -> Result<Vec<GroupId>> {
        let tables = self.tables.read().await;
        let parents: BTreeSet<_> = ids
            .iter()
            .filter_map(|id| tables.groups.get(id).and_then(|g| g.parent_id))
            .collect();
        Ok(parents.into_iter().collect())
    }

    async fn child_ids(&self, ids: &[GroupId]) -> Result<Vec<GroupId>> {
        let tables = self.tables.read().await;
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        Ok(tables
            .groups
            .values()
            .filter(|g| g.parent_id.map_or(false, |p| wanted.contains(&p)))
            .map(|g| g.id)
            .collect())
    }

    async fn insert_membership(&self, user: UserId, group: GroupId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.memberships.insert((user, group)))
    }

    async fn delete_membership(&self, user: UserId, group: GroupId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.memberships.remove(&(user, group)))
    }

    async fn user_group_ids(&self, user: UserId) -> Result<Vec<GroupId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .range((user, GroupId::MIN)..=(user, GroupId::MAX))
            .map(|(_, group)| *group)
            .collect())
    }

    async fn member_ids(&self, groups: &[GroupId]) -> Result<Vec<UserId>> {
        let tables = self.tables.read().await;
        let wanted: BTreeSet<_> = groups.iter().copied().collect();
        let members: BTreeSet<_> = tables
            .memberships
            .iter()
            .filter(|(_, group)| wanted.contains(group))
            .map(|(user, _)| *user)
            .collect();
        Ok(members.into_iter().collect())
    }

    async fn insert_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_grants.insert((user, capability)))
    }

    async fn delete_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_grants.remove(&(user, capability)))
    }

    async fn insert_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.group_grants.insert((group, capability)))
    }

    async fn delete_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.group_grants.remove(&(group, capability)))
    }

    async fn user_capability_ids(&self, user: UserId) -> Result<Vec<CapabilityId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_grants
            .range((user, CapabilityId::MIN)..=(user, CapabilityId::MAX))
            .map(|(_, capability)| *capability)
            .collect())
    }

    async fn group_capability_ids(&self, groups: &[GroupId]) -> Result<Vec<CapabilityId>> {
        let tables = self.tables.read().await;
        let wanted: BTreeSet<_> = groups.iter().copied().collect();
        let capabilities: BTreeSet<_> = tables
            .group_grants
            .iter()
            .filter(|(group, _)| wanted.contains(group))
            .map(|(_, capability)| *capability)
            .collect();
        Ok(capabilities.into_iter().collect())
    }

    async fn users_with_capability(&self, capability: CapabilityId) -> Result<Vec<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_grants
            .iter()
            .filter(|(_, c)| *c == capability)
            .map(|(user, _)| *user)
            .collect())
    }

    async fn groups_with_capability(&self, capability: CapabilityId) -> Result<Vec<GroupId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .group_grants
            .iter()
            .filter(|(_, c)| *c == capability)
            .map(|(group, _)| *group)
            .collect())
    }

    async fn delete_user(&self, user: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.memberships.retain(|(u, _)| *u != user);
        tables.user_grants.retain(|(u, _)| *u != user);
        Ok(())
    }
}
