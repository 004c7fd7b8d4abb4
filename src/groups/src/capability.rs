//! Capability store: identity lookup by id or label

use crate::cache::Invalidator;
use crate::error::{AuthzError, Result};
use crate::storage::Storage;
use crate::types::{Capability, CapabilityId, CapabilityRef};
use std::sync::Arc;
use tracing::info;

/// Capability CRUD with cascade and eviction on delete
#[derive(Clone)]
pub struct CapabilityStore {
    storage: Arc<dyn Storage>,
    invalidator: Invalidator,
}

impl CapabilityStore {
    pub fn new(storage: Arc<dyn Storage>, invalidator: Invalidator) -> Self {
        Self {
            storage,
            invalidator,
        }
    }

    /// Create a capability; the label is trimmed and must be unique
    pub async fn create(&self, label: &str) -> Result<CapabilityId> {
        self.create_with_description(label, None).await
    }

    pub async fn create_with_description(
        &self,
        label: &str,
        description: Option<&str>,
    ) -> Result<CapabilityId> {
        let label = label.trim();
        if label.is_empty() {
            return Err(AuthzError::EmptyLabel);
        }
        if self.storage.capability_by_label(label).await?.is_some() {
            return Err(AuthzError::DuplicateLabel(label.to_string()));
        }

        let capability = self.storage.insert_capability(label, description).await?;
        info!("Created capability {} ({})", capability.label, capability.id);
        Ok(capability.id)
    }

    pub async fn read(&self, id: CapabilityId) -> Result<Option<Capability>> {
        self.storage.capability(id).await
    }

    pub async fn read_by_label(&self, label: &str) -> Result<Option<Capability>> {
        self.storage.capability_by_label(label.trim()).await
    }

    /// Look up by either id or label; undefined refs resolve to nothing
    pub async fn resolve(&self, reference: &CapabilityRef) -> Result<Option<Capability>> {
        match reference {
            CapabilityRef::Id(id) => self.read(*id).await,
            CapabilityRef::Label(label) if !label.trim().is_empty() => self.read_by_label(label).await,
            _ => Ok(None),
        }
    }

    /// All capabilities ordered by id
    pub async fn list(&self) -> Result<Vec<Capability>> {
        self.storage.list_capabilities().await
    }

    /// Delete a capability, its grants, and every cached set that held it
    pub async fn delete(&self, id: CapabilityId) -> Result<()> {
        // Holders must be collected before the grants disappear
        let affected = self.invalidator.affected_by_capability(id).await?;

        if !self.storage.delete_capability(id).await? {
            return Err(AuthzError::capability_not_found(id));
        }

        let evicted = self.invalidator.evict(&affected);
        info!(
            "Deleted capability {} ({} principals affected, {} cached)",
            id,
            affected.len(),
            evicted
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, PrincipalCache};
    use crate::storage::InMemoryStorage;

    fn store() -> CapabilityStore {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let cache = PrincipalCache::new(Arc::new(MemoryCache::new()));
        let invalidator = Invalidator::new(storage.clone(), cache, None);
        CapabilityStore::new(storage, invalidator)
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let store = store();
        let id = store.create("  dance ").await.unwrap();

        let by_id = store.read(id).await.unwrap().unwrap();
        assert_eq!(by_id.label, "dance");
        let by_label = store.read_by_label("dance").await.unwrap().unwrap();
        assert_eq!(by_label.id, id);

        assert!(store.read(id + 100).await.unwrap().is_none());
        assert!(store.read_by_label("sing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = store();
        assert!(matches!(store.create("").await, Err(AuthzError::EmptyLabel)));
        assert!(matches!(store.create("   ").await, Err(AuthzError::EmptyLabel)));

        store.create("dance").await.unwrap();
        assert!(matches!(
            store.create("dance").await,
            Err(AuthzError::DuplicateLabel(label)) if label == "dance"
        ));
    }

    #[tokio::test]
    async fn test_resolve_refs() {
        let store = store();
        let id = store.create_with_description("sing", Some("Sing along")).await.unwrap();

        let by_id = store.resolve(&CapabilityRef::Id(id)).await.unwrap().unwrap();
        assert_eq!(by_id.description.as_deref(), Some("Sing along"));
        assert!(store.resolve(&CapabilityRef::from("sing")).await.unwrap().is_some());
        assert!(store.resolve(&CapabilityRef::Undefined).await.unwrap().is_none());
        assert!(store.resolve(&CapabilityRef::from("")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let id = store.create("dance").await.unwrap();

        store.delete(id).await.unwrap();
        assert!(store.read(id).await.unwrap().is_none());
        assert!(matches!(store.delete(id).await, Err(AuthzError::NotFound(_))));
        assert!(store.list().await.unwrap().is_empty());
    }
}
