//! The six directory indexes and the rules that keep them coherent
//!
//! Every index is a size- and TTL-bounded [`moka::future::Cache`]. An entry
//! leaving any index (explicitly, by TTL, by capacity, or by replacement)
//! must not leave a stale derived entry behind in a sibling index, so each
//! cache is built with an eviction listener. Listeners do exactly one thing:
//! enqueue a typed [`Eviction`] event on an unbounded channel. They never
//! touch a cache themselves, which keeps them trivially reentrancy- and
//! deadlock-free.
//!
//! [`Indexes::apply`] consumes the queue and performs the actual cross-index
//! repair. Each rule re-checks current index state before acting, so a
//! concurrently reloaded entry survives and a replaced-in-place entry only
//! propagates when its mapping really changed. Every rule only invalidates
//! or shrinks, so cascades converge.

use std::future::ready;
use std::sync::Arc;

use moka::future::{Cache, CacheBuilder};
use moka::notification::RemovalCause;
use moka::ops::compute::Op;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::config::CacheConfig;

/// An entry that left one of the six indexes, with the value it held.
#[derive(Debug)]
pub(crate) enum Eviction {
    UserName { name: String, id: i64 },
    UserId { id: i64, name: String },
    GroupName { name: String, id: i64 },
    GroupId { id: i64, name: String },
    UserGroups { user: String, groups: Vec<String> },
    GroupUsers { group: String, users: Vec<String> },
}

/// The six mutually-dependent indexes.
///
/// Indexes 1–4 are the name↔id bijections for users and groups; index 5 maps
/// a user to its ordered group names; index 6 is the derived reverse
/// projection (group → user names) and has no loader anywhere: a miss on it
/// means "not yet materialized", never "not found".
pub(crate) struct Indexes {
    pub(crate) users_to_ids: Cache<String, i64>,
    pub(crate) ids_to_users: Cache<i64, String>,
    pub(crate) groups_to_ids: Cache<String, i64>,
    pub(crate) ids_to_groups: Cache<i64, String>,
    pub(crate) users_to_groups: Cache<String, Vec<String>>,
    pub(crate) groups_to_users: Cache<String, Vec<String>>,
}

fn bounded<K, V>(config: &CacheConfig) -> CacheBuilder<K, V, Cache<K, V>>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(config.lru_max)
        .time_to_live(config.eviction_ttl)
}

impl Indexes {
    pub(crate) fn new(config: &CacheConfig, events: &UnboundedSender<Eviction>) -> Self {
        let users_to_ids = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |name: Arc<String>, id: i64, cause: RemovalCause| {
                    debug!(user = %name, id, ?cause, "user name mapping left the cache");
                    let _ = events.send(Eviction::UserName {
                        name: (*name).clone(),
                        id,
                    });
                }
            })
            .build();

        let ids_to_users = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |id: Arc<i64>, name: String, cause: RemovalCause| {
                    debug!(user = %name, id = *id, ?cause, "user id mapping left the cache");
                    let _ = events.send(Eviction::UserId { id: *id, name });
                }
            })
            .build();

        let groups_to_ids = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |name: Arc<String>, id: i64, cause: RemovalCause| {
                    debug!(group = %name, id, ?cause, "group name mapping left the cache");
                    let _ = events.send(Eviction::GroupName {
                        name: (*name).clone(),
                        id,
                    });
                }
            })
            .build();

        let ids_to_groups = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |id: Arc<i64>, name: String, cause: RemovalCause| {
                    debug!(group = %name, id = *id, ?cause, "group id mapping left the cache");
                    let _ = events.send(Eviction::GroupId { id: *id, name });
                }
            })
            .build();

        let users_to_groups = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |user: Arc<String>, groups: Vec<String>, cause: RemovalCause| {
                    debug!(user = %user, ?cause, "user's group list left the cache");
                    let _ = events.send(Eviction::UserGroups {
                        user: (*user).clone(),
                        groups,
                    });
                }
            })
            .build();

        let groups_to_users = bounded(config)
            .eviction_listener({
                let events = events.clone();
                move |group: Arc<String>, users: Vec<String>, cause: RemovalCause| {
                    debug!(group = %group, ?cause, "group's user list left the cache");
                    let _ = events.send(Eviction::GroupUsers {
                        group: (*group).clone(),
                        users,
                    });
                }
            })
            .build();

        Self {
            users_to_ids,
            ids_to_users,
            groups_to_ids,
            ids_to_groups,
            users_to_groups,
            groups_to_users,
        }
    }

    /// Repair the sibling indexes after `event`'s entry left its cache.
    ///
    /// A bijection rule fires only when the evicted pair is really gone from
    /// its own index (a reloaded entry wins) and only against a sibling
    /// entry that still holds the evicted pair (a remapped sibling stays).
    pub(crate) async fn apply(&self, event: Eviction) {
        match event {
            Eviction::UserName { name, id } => {
                if self.users_to_ids.get(&name).await != Some(id)
                    && self.ids_to_users.get(&id).await.as_deref() == Some(name.as_str())
                {
                    self.ids_to_users.invalidate(&id).await;
                }
            }
            Eviction::UserId { id, name } => {
                if self.ids_to_users.get(&id).await.as_deref() != Some(name.as_str())
                    && self.users_to_ids.get(&name).await == Some(id)
                {
                    self.users_to_ids.invalidate(&name).await;
                }
            }
            Eviction::GroupName { name, id } => {
                if self.groups_to_ids.get(&name).await != Some(id)
                    && self.ids_to_groups.get(&id).await.as_deref() == Some(name.as_str())
                {
                    self.ids_to_groups.invalidate(&id).await;
                }
            }
            Eviction::GroupId { id, name } => {
                if self.ids_to_groups.get(&id).await.as_deref() != Some(name.as_str())
                    && self.groups_to_ids.get(&name).await == Some(id)
                {
                    self.groups_to_ids.invalidate(&name).await;
                }
            }
            Eviction::UserGroups { user, groups } => {
                let current = self.users_to_groups.get(&user).await.unwrap_or_default();
                for group in groups {
                    if !current.contains(&group) {
                        self.drop_user_from_group(&group, &user).await;
                    }
                }
            }
            Eviction::GroupUsers { group, users } => {
                let current = self.groups_to_users.get(&group).await.unwrap_or_default();
                for user in users {
                    if !current.contains(&user) {
                        self.drop_group_from_user(&user, &group).await;
                    }
                }
            }
        }
    }

    /// Remove `user` from the reverse index entry of `group`, dropping the
    /// entry when its list empties.
    pub(crate) async fn drop_user_from_group(&self, group: &str, user: &str) {
        let _ = self
            .groups_to_users
            .entry(group.to_owned())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) => {
                        let mut users = entry.into_value();
                        let before = users.len();
                        users.retain(|u| u != user);
                        if users.len() == before {
                            Op::Nop
                        } else if users.is_empty() {
                            Op::Remove
                        } else {
                            Op::Put(users)
                        }
                    }
                    None => Op::Nop,
                };
                ready(op)
            })
            .await;
    }

    /// Remove `group` from the group list of `user`, dropping the entry when
    /// its list empties.
    pub(crate) async fn drop_group_from_user(&self, user: &str, group: &str) {
        let _ = self
            .users_to_groups
            .entry(user.to_owned())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) => {
                        let mut groups = entry.into_value();
                        let before = groups.len();
                        groups.retain(|g| g != group);
                        if groups.len() == before {
                            Op::Nop
                        } else if groups.is_empty() {
                            Op::Remove
                        } else {
                            Op::Put(groups)
                        }
                    }
                    None => Op::Nop,
                };
                ready(op)
            })
            .await;
    }

    /// Append `user` to the reverse index entry of `group`, creating the
    /// entry if absent. Idempotent.
    pub(crate) async fn append_user_to_group(&self, group: &str, user: &str) {
        let _ = self
            .groups_to_users
            .entry(group.to_owned())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) => {
                        let mut users = entry.into_value();
                        if users.iter().any(|u| u == user) {
                            Op::Nop
                        } else {
                            users.push(user.to_owned());
                            Op::Put(users)
                        }
                    }
                    None => Op::Put(vec![user.to_owned()]),
                };
                ready(op)
            })
            .await;
    }

    /// Merge `groups` into the group list of `user` (creating it if absent)
    /// and return the names that were not present before.
    pub(crate) async fn merge_user_groups(&self, user: &str, groups: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        let _ = self
            .users_to_groups
            .entry(user.to_owned())
            .and_compute_with(|entry| {
                let mut current = entry.map(|e| e.into_value()).unwrap_or_default();
                for group in groups {
                    if !current.contains(group) {
                        current.push(group.clone());
                        added.push(group.clone());
                    }
                }
                let op = if added.is_empty() {
                    Op::Nop
                } else {
                    Op::Put(current)
                };
                ready(op)
            })
            .await;
        added
    }
}
