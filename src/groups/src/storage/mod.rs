//! Relational storage consumed by the capability, group and grant stores
//!
//! The backend owns four tables: capabilities, groups, memberships and
//! direct grants (user and group). Deleting a capability or group cascades to
//! the rows referencing it, the way foreign keys with `ON DELETE CASCADE`
//! behave. Validation and cache eviction live one layer up.

mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStorage;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;

use crate::error::Result;
use crate::types::{Capability, CapabilityId, Group, GroupId, NewGroup, UserId};
use async_trait::async_trait;

/// Storage backend trait
#[async_trait]
pub trait Storage: Send + Sync {
    // Capabilities

    /// Insert a capability; the label is assumed trimmed and non-empty.
    /// Fails with `DuplicateLabel` if the label is taken.
    async fn insert_capability(&self, label: &str, description: Option<&str>) -> Result<Capability>;

    /// Point lookup by id
    async fn capability(&self, id: CapabilityId) -> Result<Option<Capability>>;

    /// Point lookup by label
    async fn capability_by_label(&self, label: &str) -> Result<Option<Capability>>;

    /// Batch lookup, ordered by id; unknown ids are skipped
    async fn capabilities_by_ids(&self, ids: &[CapabilityId]) -> Result<Vec<Capability>>;

    /// All capabilities ordered by id
    async fn list_capabilities(&self) -> Result<Vec<Capability>>;

    /// Delete a capability and every grant referencing it.
    /// Returns false if it did not exist.
    async fn delete_capability(&self, id: CapabilityId) -> Result<bool>;

    // Groups

    /// Insert a group; the name is assumed validated.
    /// Fails with `InvalidParent` if the parent does not exist.
    async fn insert_group(&self, group: &NewGroup) -> Result<Group>;

    /// Point lookup by id
    async fn group(&self, id: GroupId) -> Result<Option<Group>>;

    /// First group with the given name, by ascending id
    async fn group_by_name(&self, name: &str) -> Result<Option<Group>>;

    /// All groups ordered by id
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Total number of groups
    async fn group_count(&self) -> Result<usize>;

    /// Overwrite name, description and parent of an existing group
    async fn update_group(&self, group: &Group) -> Result<bool>;

    /// Re-link every child of `parent` to `new_parent`
    async fn reparent_children(&self, parent: GroupId, new_parent: Option<GroupId>) -> Result<()>;

    /// Delete a group with its memberships and grants.
    /// Returns false if it did not exist.
    async fn delete_group(&self, id: GroupId) -> Result<bool>;

    /// Distinct parent ids of the given groups (roots contribute nothing)
    async fn parent_ids(&self, ids: &[GroupId]) -> Result<Vec<GroupId>>;

    /// Distinct ids of groups whose parent is one of `ids`
    async fn child_ids(&self, ids: &[GroupId]) -> Result<Vec<GroupId>>;

    // Memberships

    /// Returns false if the pair already existed
    async fn insert_membership(&self, user: UserId, group: GroupId) -> Result<bool>;

    /// Returns false if the pair did not exist
    async fn delete_membership(&self, user: UserId, group: GroupId) -> Result<bool>;

    /// Groups the user is a direct member of
    async fn user_group_ids(&self, user: UserId) -> Result<Vec<GroupId>>;

    /// Distinct direct members of any of the given groups
    async fn member_ids(&self, groups: &[GroupId]) -> Result<Vec<UserId>>;

    // Direct grants

    /// Returns false if the grant already existed
    async fn insert_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool>;

    /// Returns false if the grant did not exist
    async fn delete_user_capability(&self, user: UserId, capability: CapabilityId) -> Result<bool>;

    /// Returns false if the grant already existed
    async fn insert_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool>;

    /// Returns false if the grant did not exist
    async fn delete_group_capability(&self, group: GroupId, capability: CapabilityId) -> Result<bool>;

    /// Capabilities granted directly to the user
    async fn user_capability_ids(&self, user: UserId) -> Result<Vec<CapabilityId>>;

    /// Distinct capabilities granted directly to any of the groups
    async fn group_capability_ids(&self, groups: &[GroupId]) -> Result<Vec<CapabilityId>>;

    /// Users holding a direct grant of the capability
    async fn users_with_capability(&self, capability: CapabilityId) -> Result<Vec<UserId>>;

    /// Groups holding a direct grant of the capability
    async fn groups_with_capability(&self, capability: CapabilityId) -> Result<Vec<GroupId>>;

    // Users

    /// Remove every membership and direct grant of a user
    async fn delete_user(&self, user: UserId) -> Result<()>;
}
