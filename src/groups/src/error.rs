//! Error types for the permission resolver

use crate::types::{CapabilityId, GroupId};
use thiserror::Error;

/// Resolver and store errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Read or delete by an id that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capability label already used by another capability
    #[error("Duplicate capability label: {0}")]
    DuplicateLabel(String),

    /// Group created or renamed with an empty name
    #[error("Group name cannot be empty")]
    EmptyName,

    /// Capability created with an empty label
    #[error("Capability label cannot be empty")]
    EmptyLabel,

    /// Parent group does not exist or would introduce a cycle
    #[error("Invalid parent group {parent}: {reason}")]
    InvalidParent { parent: GroupId, reason: String },

    /// Malformed principal reference
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    /// Malformed capability reference
    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    /// Storage backend failure, passed through uninterpreted
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration or seed file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    pub(crate) fn capability_not_found(id: CapabilityId) -> Self {
        Self::NotFound(format!("capability {}", id))
    }

    pub(crate) fn group_not_found(id: GroupId) -> Self {
        Self::NotFound(format!("group {}", id))
    }

    /// True for domain "absent" conditions that `can()` folds into a deny
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<toml::de::Error> for AuthzError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, AuthzError>;
