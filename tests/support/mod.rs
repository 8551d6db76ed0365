//! In-memory directory store backing the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ugcache::{
    CacheConfig, DirectoryConnector, DirectoryError, Group, GroupAccess, MembershipAccess, User,
    UserAccess, UsersGroupsCache,
};

/// Per-call counters, so tests can assert exactly how much directory
/// traffic an operation produced.
#[derive(Default)]
pub struct Counters {
    pub user_lookups: AtomicUsize,
    pub group_lookups: AtomicUsize,
    pub membership_queries: AtomicUsize,
    pub user_inserts: AtomicUsize,
    pub group_inserts: AtomicUsize,
    pub membership_inserts: AtomicUsize,
}

#[derive(Default)]
struct Tables {
    users: HashMap<i64, String>,
    groups: HashMap<i64, String>,
    memberships: Vec<(i64, i64)>,
    next_user_id: i64,
    next_group_id: i64,
}

/// A directory store over plain hash maps. Users get ids from 101, groups
/// from 301. Rows can be seeded and deleted behind the cache's back to set
/// up staleness scenarios.
pub struct MemoryDirectory {
    tables: Mutex<Tables>,
    pub counters: Counters,
    fail_reads: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl MemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(Tables {
                next_user_id: 101,
                next_group_id: 301,
                ..Tables::default()
            }),
            counters: Counters::default(),
            fail_reads: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
        })
    }

    pub fn seed_user(&self, id: i64, name: &str) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(id, name.to_owned());
        tables.next_user_id = tables.next_user_id.max(id + 1);
    }

    pub fn seed_group(&self, id: i64, name: &str) {
        let mut tables = self.tables.lock().unwrap();
        tables.groups.insert(id, name.to_owned());
        tables.next_group_id = tables.next_group_id.max(id + 1);
    }

    pub fn seed_membership(&self, user_id: i64, group_id: i64) {
        self.tables
            .lock()
            .unwrap()
            .memberships
            .push((user_id, group_id));
    }

    /// Delete a user row without telling the cache.
    pub fn delete_user_row(&self, id: i64) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.remove(&id);
        tables.memberships.retain(|(u, _)| *u != id);
    }

    /// Delete a group row without telling the cache.
    pub fn delete_group_row(&self, id: i64) {
        let mut tables = self.tables.lock().unwrap();
        tables.groups.remove(&id);
        tables.memberships.retain(|(_, g)| *g != id);
    }

    pub fn membership_rows(&self) -> Vec<(i64, i64)> {
        self.tables.lock().unwrap().memberships.clone()
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.tables
            .lock()
            .unwrap()
            .users
            .values()
            .any(|n| n == name)
    }

    /// Make every read fail with a storage fault.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Delay membership queries, so tests can pile callers onto one load.
    pub fn delay_reads(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), DirectoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DirectoryError::storage("injected read failure"));
        }
        Ok(())
    }

    async fn read_delay(&self) {
        let ms = self.read_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl UserAccess for MemoryDirectory {
    async fn user_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError> {
        self.counters.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|(_, n)| *n == name).map(|(id, n)| User {
            id: *id,
            name: n.clone(),
        }))
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        self.counters.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.get(&id).map(|n| User {
            id,
            name: n.clone(),
        }))
    }

    async fn add_user(&self, name: &str) -> Result<User, DirectoryError> {
        self.counters.user_inserts.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if tables.users.values().any(|n| n == name) {
            return Err(DirectoryError::UniqueKey(format!(
                "user '{name}' already exists"
            )));
        }
        let id = tables.next_user_id;
        tables.next_user_id += 1;
        tables.users.insert(id, name.to_owned());
        Ok(User {
            id,
            name: name.to_owned(),
        })
    }

    async fn remove_user(&self, id: i64) -> Result<(), DirectoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.users.remove(&id);
        tables.memberships.retain(|(u, _)| *u != id);
        Ok(())
    }
}

#[async_trait]
impl GroupAccess for MemoryDirectory {
    async fn group_by_name(&self, name: &str) -> Result<Option<Group>, DirectoryError> {
        self.counters.group_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .groups
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(id, n)| Group {
                id: *id,
                name: n.clone(),
            }))
    }

    async fn group_by_id(&self, id: i64) -> Result<Option<Group>, DirectoryError> {
        self.counters.group_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.groups.get(&id).map(|n| Group {
            id,
            name: n.clone(),
        }))
    }

    async fn add_group(&self, name: &str) -> Result<Group, DirectoryError> {
        self.counters.group_inserts.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if tables.groups.values().any(|n| n == name) {
            return Err(DirectoryError::UniqueKey(format!(
                "group '{name}' already exists"
            )));
        }
        let id = tables.next_group_id;
        tables.next_group_id += 1;
        tables.groups.insert(id, name.to_owned());
        Ok(Group {
            id,
            name: name.to_owned(),
        })
    }

    async fn remove_group(&self, id: i64) -> Result<(), DirectoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.groups.remove(&id);
        tables.memberships.retain(|(_, g)| *g != id);
        Ok(())
    }
}

#[async_trait]
impl MembershipAccess for MemoryDirectory {
    async fn add_user_to_groups(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<(), DirectoryError> {
        self.counters
            .membership_inserts
            .fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(&user_id) {
            return Err(DirectoryError::ForeignKey(format!(
                "no user row with id {user_id}"
            )));
        }
        for group_id in group_ids {
            if !tables.groups.contains_key(group_id) {
                return Err(DirectoryError::ForeignKey(format!(
                    "no group row with id {group_id}"
                )));
            }
            if tables.memberships.contains(&(user_id, *group_id)) {
                return Err(DirectoryError::UniqueKey(format!(
                    "membership ({user_id}, {group_id}) already exists"
                )));
            }
        }
        for group_id in group_ids {
            tables.memberships.push((user_id, *group_id));
        }
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<(), DirectoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .memberships
            .retain(|row| *row != (user_id, group_id));
        Ok(())
    }

    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<Group>, DirectoryError> {
        self.counters
            .membership_queries
            .fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        self.read_delay().await;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .memberships
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, g)| {
                tables.groups.get(g).map(|name| Group {
                    id: *g,
                    name: name.clone(),
                })
            })
            .collect())
    }
}

/// A connector that tracks transaction state and call counts.
#[derive(Default)]
pub struct MemoryConnector {
    active: AtomicBool,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretend an enclosing transaction is (or is no longer) running.
    pub fn force_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryConnector for MemoryConnector {
    async fn is_transaction_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn begin_transaction(&self) -> Result<(), DirectoryError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DirectoryError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DirectoryError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A cache wired to the given in-memory directory.
pub fn cache_over(directory: &Arc<MemoryDirectory>, config: CacheConfig) -> UsersGroupsCache {
    init_tracing();
    UsersGroupsCache::new(
        Some(directory.clone() as Arc<dyn UserAccess>),
        Some(directory.clone() as Arc<dyn GroupAccess>),
        Some(directory.clone() as Arc<dyn MembershipAccess>),
        None,
        config,
    )
}

/// Same, with a transaction connector.
pub fn cache_over_with_connector(
    directory: &Arc<MemoryDirectory>,
    connector: &Arc<MemoryConnector>,
    config: CacheConfig,
) -> UsersGroupsCache {
    init_tracing();
    UsersGroupsCache::new(
        Some(directory.clone() as Arc<dyn UserAccess>),
        Some(directory.clone() as Arc<dyn GroupAccess>),
        Some(directory.clone() as Arc<dyn MembershipAccess>),
        Some(connector.clone() as Arc<dyn DirectoryConnector>),
        config,
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
