//! Declarative seed data
//!
//! A seed describes capabilities, a group forest and user grants by name and
//! is applied through the public store API, so every validation rule holds.
//!
//! ```toml
//! capabilities = ["dance", { label = "sing", description = "Sing along" }]
//!
//! [[groups]]
//! name = "Fruits"
//! capabilities = ["dance"]
//!
//! [[groups]]
//! name = "Sour"
//! parent = "Fruits"
//! capabilities = ["sing"]
//!
//! [[users]]
//! id = 1
//! groups = ["Sour"]
//! ```
//!
//! Groups are created in document order; a parent must appear before its
//! children.

use crate::authz::Authz;
use crate::error::{AuthzError, Result};
use crate::types::{CapabilityId, GroupId, NewGroup, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Capability entry: a bare label or a label with description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedCapability {
    Label(String),
    Described {
        label: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl SeedCapability {
    pub fn label(&self) -> &str {
        match self {
            SeedCapability::Label(label) | SeedCapability::Described { label, .. } => label,
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            SeedCapability::Label(_) => None,
            SeedCapability::Described { description, .. } => description.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedGroup {
    pub name: String,
    /// Name of a group declared earlier in the seed
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Labels granted directly to the group
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: UserId,
    /// Group names the user is a member of
    #[serde(default)]
    pub groups: Vec<String>,
    /// Labels granted directly to the user
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Complete seed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub capabilities: Vec<SeedCapability>,
    pub groups: Vec<SeedGroup>,
    pub users: Vec<SeedUser>,
}

/// Ids assigned while applying a seed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedIds {
    pub capabilities: BTreeMap<String, CapabilityId>,
    pub groups: BTreeMap<String, GroupId>,
}

impl SeedIds {
    fn capability(&self, label: &str) -> Result<CapabilityId> {
        self.capabilities
            .get(label.trim())
            .copied()
            .ok_or_else(|| AuthzError::Config(format!("unknown capability '{}' in seed", label)))
    }

    fn group(&self, name: &str) -> Result<GroupId> {
        self.groups
            .get(name.trim())
            .copied()
            .ok_or_else(|| AuthzError::Config(format!("unknown group '{}' in seed", name)))
    }
}

impl Seed {
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load a `.json` or `.toml` seed file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(AuthzError::Config(format!(
                "unsupported seed file {}: expected .json or .toml",
                path.display()
            ))),
        }
    }

    /// Create everything the seed describes
    pub async fn apply(&self, authz: &Authz) -> Result<SeedIds> {
        let mut ids = SeedIds::default();

        for capability in &self.capabilities {
            let id = authz
                .capabilities()
                .create_with_description(capability.label(), capability.description())
                .await?;
            ids.capabilities.insert(capability.label().trim().to_string(), id);
        }

        for group in &self.groups {
            let name = group.name.trim();
            if ids.groups.contains_key(name) {
                return Err(AuthzError::Config(format!("group '{}' declared twice in seed", name)));
            }

            let parent = match &group.parent {
                Some(parent) => Some(ids.group(parent)?),
                None => None,
            };
            let mut definition = NewGroup::new(name);
            definition.parent_id = parent;
            definition.description = group.description.clone();

            let id = authz.groups().create_with(definition).await?;
            ids.groups.insert(name.to_string(), id);

            for label in &group.capabilities {
                authz.grants().add_group_capability(id, ids.capability(label)?).await?;
            }
        }

        for user in &self.users {
            for name in &user.groups {
                authz.grants().add_member(user.id, ids.group(name)?).await?;
            }
            for label in &user.capabilities {
                authz.grants().add_user_capability(user.id, ids.capability(label)?).await?;
            }
        }

        info!(
            "Applied seed: {} capabilities, {} groups, {} users",
            ids.capabilities.len(),
            ids.groups.len(),
            self.users.len()
        );
        Ok(ids)
    }
}
