//! ugcache - coherent multi-index directory cache
//!
//! This library fronts a persistent users-and-groups directory with six
//! mutually consistent in-memory indexes:
//! - user name ↔ user id and group name ↔ group id (both directions)
//! - user name → ordered group names (read-through loaded)
//! - group name → user names (derived reverse projection, never loaded)
//!
//! The cache supports:
//! - Per-index size and TTL bounds
//! - Per-key single-flight read-through loaders that back-fill siblings
//! - Eviction propagation so no stale name/id/membership pair survives
//! - Constraint-violation recovery for bulk membership grants
//! - A pass-through mode when the directory adapters are not wired
//!
//! The directory itself stays external, reached through the narrow
//! [`UserAccess`], [`GroupAccess`] and [`MembershipAccess`] traits; a miss
//! the directory cannot satisfy is a not-found sentinel, not an error.

mod cache;
mod coherence;
mod config;
mod directory;
mod error;

pub use cache::UsersGroupsCache;
pub use config::CacheConfig;
pub use directory::{
    DirectoryConnector, Group, GroupAccess, MembershipAccess, User, UserAccess,
};
pub use error::{CacheError, DirectoryError};
