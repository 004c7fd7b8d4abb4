//! Core permission model types

use crate::error::{AuthzError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique capability identifier
pub type CapabilityId = i64;

/// Unique group identifier
pub type GroupId = i64;

/// User identifier, supplied by the host application
pub type UserId = i64;

/// A named permission unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    /// Stable identifier assigned by storage
    pub id: CapabilityId,

    /// Unique label (e.g., "edit_posts")
    pub label: String,

    /// Optional human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A node in the group forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier
    pub id: GroupId,

    /// Group name (not required to be unique)
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parent group, `None` for roots
    #[serde(default)]
    pub parent_id: Option<GroupId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

impl NewGroup {
    /// Create a root group definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parent_id: None,
        }
    }

    /// Attach the group under `parent`
    pub fn with_parent(mut self, parent: GroupId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a group; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<GroupId>>,
}

impl GroupUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Move the group under `parent`, or make it a root with `None`
    pub fn parent(mut self, parent: Option<GroupId>) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// True when the update touches the hierarchy
    pub fn changes_parent(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Principal holding capabilities: a user or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
}

impl Principal {
    /// Raw id of the principal
    pub fn id(&self) -> i64 {
        match self {
            Principal::User(id) | Principal::Group(id) => *id,
        }
    }

    /// Reject non-positive ids, which storage never assigns
    pub fn validate(&self) -> Result<()> {
        if self.id() <= 0 {
            return Err(AuthzError::InvalidPrincipal(format!(
                "{} has a non-positive id",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User(id) => write!(f, "user:{}", id),
            Principal::Group(id) => write!(f, "group:{}", id),
        }
    }
}

impl FromStr for Principal {
    type Err = AuthzError;

    /// Parse `user:<id>` or `group:<id>`
    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| AuthzError::InvalidPrincipal(s.to_string()))?;
        let id: i64 = id
            .trim()
            .parse()
            .map_err(|_| AuthzError::InvalidPrincipal(s.to_string()))?;

        let principal = match kind.trim() {
            "user" => Principal::User(id),
            "group" => Principal::Group(id),
            _ => return Err(AuthzError::InvalidPrincipal(s.to_string())),
        };
        principal.validate()?;
        Ok(principal)
    }
}

/// Reference to a capability passed to `can()`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityRef {
    /// Numeric capability id
    Id(CapabilityId),
    /// Capability label
    Label(String),
    /// Null reference; never granted
    Undefined,
}

impl CapabilityRef {
    /// Parse user input: all-digit strings are ids, anything else a label
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AuthzError::InvalidCapability(
                "capability reference is empty".to_string(),
            ));
        }
        if input.bytes().all(|b| b.is_ascii_digit()) {
            let id = input
                .parse()
                .map_err(|_| AuthzError::InvalidCapability(input.to_string()))?;
            return Ok(CapabilityRef::Id(id));
        }
        Ok(CapabilityRef::Label(input.to_string()))
    }

    /// True for references that can never match a capability
    pub fn is_undefined(&self) -> bool {
        match self {
            CapabilityRef::Undefined => true,
            CapabilityRef::Label(label) => label.trim().is_empty(),
            CapabilityRef::Id(_) => false,
        }
    }
}

impl From<CapabilityId> for CapabilityRef {
    fn from(id: CapabilityId) -> Self {
        CapabilityRef::Id(id)
    }
}

impl From<&str> for CapabilityRef {
    fn from(label: &str) -> Self {
        CapabilityRef::Label(label.to_string())
    }
}

impl From<String> for CapabilityRef {
    fn from(label: String) -> Self {
        CapabilityRef::Label(label)
    }
}

impl From<&Capability> for CapabilityRef {
    fn from(capability: &Capability) -> Self {
        CapabilityRef::Id(capability.id)
    }
}

impl<T: Into<CapabilityRef>> From<Option<T>> for CapabilityRef {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CapabilityRef::Undefined)
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityRef::Id(id) => write!(f, "#{}", id),
            CapabilityRef::Label(label) => f.write_str(label),
            CapabilityRef::Undefined => f.write_str("<undefined>"),
        }
    }
}
