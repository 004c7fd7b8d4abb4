//! # Groups Authorization Resolver
//!
//! Role-based access control built around a forest of groups.
//!
//! ## Features
//!
//! - **Group inheritance**: capabilities granted to a group flow to every
//!   descendant group and to the members of those groups, never upward
//! - **Direct grants** to users and groups, plus user↔group memberships
//! - **Cached effective sets** per principal, evicted synchronously by every
//!   write that could change them (including transitive group changes)
//! - **Bounded hierarchy walks** that terminate even over corrupt parent links
//! - **Pluggable storage**: in-memory, or PostgreSQL behind the `postgres` feature
//!
//! ## Example
//!
//! ```rust
//! use groups_authz::{Authz, AuthzConfig, Principal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let authz = Authz::in_memory(AuthzConfig::default());
//!
//!     let dance = authz.capabilities().create("dance").await?;
//!     let fruits = authz.groups().create("Fruits", None).await?;
//!     let banana = authz.groups().create("Banana", Some(fruits)).await?;
//!     authz.grants().add_group_capability(fruits, dance).await?;
//!     authz.grants().add_member(7, banana).await?;
//!
//!     if authz.can(&Principal::User(7), "dance").await? {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod authz;
pub mod cache;
pub mod capability;
pub mod config;
pub mod error;
pub mod grant;
pub mod group;
pub mod hierarchy;
pub mod metrics;
pub mod resolver;
pub mod seed;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use authz::Authz;
pub use cache::{CacheStats, LruObjectCache, MemoryCache, ObjectCache};
pub use capability::CapabilityStore;
pub use config::{AuthzConfig, CacheBackend, CacheConfig, OrphanPolicy};
pub use error::{AuthzError, Result};
pub use grant::GrantStore;
pub use group::GroupStore;
pub use metrics::{MetricsCollector, ResolverMetrics};
pub use resolver::{Resolver, SuperRole};
pub use seed::Seed;
pub use storage::{InMemoryStorage, Storage};
pub use types::{
    Capability, CapabilityId, CapabilityRef, Group, GroupId, GroupUpdate, NewGroup, Principal, UserId,
};

#[cfg(feature = "postgres")]
pub use storage::PostgresStorage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
