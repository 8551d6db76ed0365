//! The public users-and-groups cache
//!
//! [`UsersGroupsCache`] fronts a persistent directory with six coherent
//! in-memory indexes. Reads go through per-key single-flight loaders that
//! back-fill sibling indexes; writes go to the directory first and then to
//! the indexes; evictions propagate through the coherence queue so no stale
//! pair survives. When the directory adapters are not wired the whole
//! module degrades to sentinel returns without touching anything.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

use crate::coherence::{Eviction, Indexes};
use crate::config::CacheConfig;
use crate::directory::{
    DirectoryConnector, DirectoryGateway, GroupAccess, MembershipAccess, UserAccess,
};
use crate::error::{CacheError, DirectoryError, LoadError};

struct CacheInner {
    directory: DirectoryGateway,
    indexes: Indexes,
    events: Mutex<UnboundedReceiver<Eviction>>,
}

/// Bounded, time-expiring, multi-index cache over a users-and-groups
/// directory.
///
/// Cheap to clone; clones share the indexes and the directory adapters.
#[derive(Clone)]
pub struct UsersGroupsCache {
    inner: Option<Arc<CacheInner>>,
}

impl UsersGroupsCache {
    /// Build the cache over the three directory adapters.
    ///
    /// If any adapter is `None` the instance is not configured: every
    /// operation returns its not-found sentinel without touching caches or
    /// directory. The connector is optional; without it each directory call
    /// is its own unit of work.
    pub fn new(
        user_access: Option<Arc<dyn UserAccess>>,
        group_access: Option<Arc<dyn GroupAccess>>,
        membership_access: Option<Arc<dyn MembershipAccess>>,
        connector: Option<Arc<dyn DirectoryConnector>>,
        config: CacheConfig,
    ) -> Self {
        let (Some(users), Some(groups), Some(memberships)) =
            (user_access, group_access, membership_access)
        else {
            warn!("directory access is not fully wired; users/groups cache is disabled");
            return Self { inner: None };
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = CacheInner {
            directory: DirectoryGateway::new(users, groups, memberships, connector),
            indexes: Indexes::new(&config, &events_tx),
            events: Mutex::new(events_rx),
        };
        Self {
            inner: Some(Arc::new(inner)),
        }
    }

    /// Whether all three directory adapters are wired.
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    // ---- users ----------------------------------------------------------

    /// Add a user to the directory and both name↔id indexes. Returns the new
    /// id, or `0` when not configured.
    pub async fn add_user(&self, user_name: &str) -> Result<i64, CacheError> {
        let Some(inner) = &self.inner else { return Ok(0) };
        if user_name.is_empty() {
            return Ok(0);
        }
        debug!(user = %user_name, "adding user to the directory");
        let user = inner.directory.add_user(user_name).await?;
        inner.indexes.ids_to_users.insert(user.id, user.name.clone()).await;
        inner.indexes.users_to_ids.insert(user.name, user.id).await;
        inner.drain().await;
        Ok(user.id)
    }

    /// Remove a user from the directory and every index that knows it.
    pub async fn remove_user(&self, user_name: &str) -> Result<(), CacheError> {
        let Some(inner) = &self.inner else { return Ok(()) };
        if user_name.is_empty() {
            return Ok(());
        }
        debug!(user = %user_name, "removing user from the directory");
        let user_id = self.get_user_id(user_name).await?;
        if user_id != 0 {
            inner.directory.remove_user(user_id).await?;
        }
        inner.invalidate_user_entries(user_name, user_id).await;
        inner.drain().await;
        Ok(())
    }

    /// Drop a user from every index without touching the directory. Used to
    /// repair local state after an upstream mutation.
    pub async fn remove_user_from_cache(&self, user_name: &str) {
        let Some(inner) = &self.inner else { return };
        let user_id = inner.indexes.users_to_ids.get(user_name).await.unwrap_or(0);
        inner.invalidate_user_entries(user_name, user_id).await;
        inner.drain().await;
    }

    /// Resolve a user name to its id, loading from the directory on a miss.
    /// Returns `0` for an unknown user.
    pub async fn get_user_id(&self, user_name: &str) -> Result<i64, CacheError> {
        let Some(inner) = &self.inner else { return Ok(0) };
        if user_name.is_empty() {
            return Ok(0);
        }
        let result = inner
            .indexes
            .users_to_ids
            .try_get_with(user_name.to_owned(), inner.load_user_id(user_name))
            .await;
        inner.drain().await;
        match result {
            Ok(id) => Ok(id),
            Err(err) => match err.as_ref() {
                LoadError::NotFound => Ok(0),
                LoadError::Directory(cause) => Err(cause.clone().into()),
            },
        }
    }

    /// Resolve a user id to its name, loading from the directory on a miss.
    /// Returns `None` for an unknown id; `0` and negative ids are never real.
    pub async fn get_user_name(&self, user_id: i64) -> Result<Option<String>, CacheError> {
        let Some(inner) = &self.inner else { return Ok(None) };
        if user_id <= 0 {
            return Ok(None);
        }
        let result = inner
            .indexes
            .ids_to_users
            .try_get_with(user_id, inner.load_user_name(user_id))
            .await;
        inner.drain().await;
        match result {
            Ok(name) => Ok(Some(name)),
            Err(err) => match err.as_ref() {
                LoadError::NotFound => Ok(None),
                LoadError::Directory(cause) => Err(cause.clone().into()),
            },
        }
    }

    // ---- groups ---------------------------------------------------------

    /// Add a group to the directory and both name↔id indexes. Returns the
    /// new id, or `0` when not configured.
    pub async fn add_group(&self, group_name: &str) -> Result<i64, CacheError> {
        let Some(inner) = &self.inner else { return Ok(0) };
        if group_name.is_empty() {
            return Ok(0);
        }
        debug!(group = %group_name, "adding group to the directory");
        let group = inner.directory.add_group(group_name).await?;
        inner.indexes.ids_to_groups.insert(group.id, group.name.clone()).await;
        inner.indexes.groups_to_ids.insert(group.name, group.id).await;
        inner.drain().await;
        Ok(group.id)
    }

    /// Remove a group from the directory and every index that knows it.
    pub async fn remove_group(&self, group_name: &str) -> Result<(), CacheError> {
        let Some(inner) = &self.inner else { return Ok(()) };
        if group_name.is_empty() {
            return Ok(());
        }
        debug!(group = %group_name, "removing group from the directory");
        let group_id = self.get_group_id(group_name).await?;
        if group_id != 0 {
            inner.directory.remove_group(group_id).await?;
        }
        inner.invalidate_group_entries(group_name, group_id).await;
        inner.drain().await;
        Ok(())
    }

    /// Drop a group from every index without touching the directory.
    pub async fn remove_group_from_cache(&self, group_name: &str) {
        let Some(inner) = &self.inner else { return };
        let group_id = inner.indexes.groups_to_ids.get(group_name).await.unwrap_or(0);
        inner.invalidate_group_entries(group_name, group_id).await;
        inner.drain().await;
    }

    /// Resolve a group name to its id. Returns `0` for an unknown group.
    pub async fn get_group_id(&self, group_name: &str) -> Result<i64, CacheError> {
        let Some(inner) = &self.inner else { return Ok(0) };
        if group_name.is_empty() {
            return Ok(0);
        }
        let result = inner
            .indexes
            .groups_to_ids
            .try_get_with(group_name.to_owned(), inner.load_group_id(group_name))
            .await;
        inner.drain().await;
        match result {
            Ok(id) => Ok(id),
            Err(err) => match err.as_ref() {
                LoadError::NotFound => Ok(0),
                LoadError::Directory(cause) => Err(cause.clone().into()),
            },
        }
    }

    /// Resolve a group id to its name. Returns `None` for an unknown id.
    pub async fn get_group_name(&self, group_id: i64) -> Result<Option<String>, CacheError> {
        let Some(inner) = &self.inner else { return Ok(None) };
        if group_id <= 0 {
            return Ok(None);
        }
        let result = inner
            .indexes
            .ids_to_groups
            .try_get_with(group_id, inner.load_group_name(group_id))
            .await;
        inner.drain().await;
        match result {
            Ok(name) => Ok(Some(name)),
            Err(err) => match err.as_ref() {
                LoadError::NotFound => Ok(None),
                LoadError::Directory(cause) => Err(cause.clone().into()),
            },
        }
    }

    // ---- memberships ----------------------------------------------------

    /// The groups a user belongs to, in directory order. Loads and
    /// back-fills on a miss; `None` means the user is unknown or has no
    /// groups.
    pub async fn get_groups(&self, user_name: &str) -> Result<Option<Vec<String>>, CacheError> {
        let Some(inner) = &self.inner else { return Ok(None) };
        if user_name.is_empty() {
            return Ok(None);
        }
        let result = inner
            .indexes
            .users_to_groups
            .try_get_with(user_name.to_owned(), inner.load_user_groups(user_name))
            .await;
        inner.drain().await;
        match result {
            Ok(groups) => Ok(Some(groups)),
            Err(err) => match err.as_ref() {
                LoadError::NotFound => Ok(None),
                LoadError::Directory(cause) => Err(cause.clone().into()),
            },
        }
    }

    /// Grant a single membership. See [`UsersGroupsCache::add_user_groups`].
    pub async fn add_user_to_group(
        &self,
        user_name: &str,
        group_name: &str,
    ) -> Result<(), CacheError> {
        self.add_user_groups(Some(user_name), &[Some(group_name)]).await
    }

    /// Add a user to a set of groups, creating the user and any missing
    /// groups in the directory along the way.
    ///
    /// `None` entries in `group_names` are skipped; a `None` user still
    /// creates the named groups (upstream notifications carry group-only
    /// events). If the cached group list for the user already contains every
    /// requested group the call returns without a directory write; callers
    /// treat the group set as growing, so a cached superset is proof enough.
    ///
    /// A unique-key violation anywhere in the attempt means the desired rows
    /// already exist and is treated as success. A foreign-key violation
    /// means the cached ids are stale: the user and groups are dropped from
    /// every index and the operation retried once.
    pub async fn add_user_groups(
        &self,
        user_name: Option<&str>,
        group_names: &[Option<&str>],
    ) -> Result<(), CacheError> {
        let Some(inner) = &self.inner else { return Ok(()) };

        let user_name = user_name.filter(|name| !name.is_empty());
        let groups: Vec<&str> = group_names
            .iter()
            .flatten()
            .copied()
            .filter(|name| !name.is_empty())
            .collect();

        let outcome = match inner.add_user_groups_once(user_name, &groups).await {
            Err(CacheError::Directory(DirectoryError::ForeignKey(cause))) => {
                debug!(%cause, "membership write hit missing rows; refreshing ids and retrying");
                if let Some(user) = user_name {
                    self.remove_user_from_cache(user).await;
                }
                for group in &groups {
                    self.remove_group_from_cache(group).await;
                }
                inner.add_user_groups_once(user_name, &groups).await
            }
            Err(CacheError::Directory(DirectoryError::UniqueKey(cause))) => {
                debug!(%cause, "user or group already present; nothing to add");
                Ok(())
            }
            other => other,
        };
        inner.drain().await;
        outcome
    }

    /// Revoke a single membership in the directory and both membership
    /// indexes, dropping entries whose lists empty.
    pub async fn remove_user_from_group(
        &self,
        user_name: &str,
        group_name: &str,
    ) -> Result<(), CacheError> {
        let Some(inner) = &self.inner else { return Ok(()) };
        if user_name.is_empty() || group_name.is_empty() {
            return Ok(());
        }
        debug!(user = %user_name, group = %group_name, "revoking membership");
        let user_id = self.get_user_id(user_name).await?;
        let group_id = self.get_group_id(group_name).await?;
        if user_id != 0 && group_id != 0 {
            inner.directory.remove_user_from_group(user_id, group_id).await?;
        }
        inner.indexes.drop_group_from_user(user_name, group_name).await;
        inner.indexes.drop_user_from_group(group_name, user_name).await;
        inner.drain().await;
        Ok(())
    }

    // ---- notification-path wrappers -------------------------------------

    /// Grant a membership, optionally touching only the indexes.
    ///
    /// With `cache_only` the directory is assumed to already hold the rows
    /// (another node wrote them); only the local indexes are updated.
    pub async fn add_user_group_tx(
        &self,
        user_name: Option<&str>,
        group_name: Option<&str>,
        cache_only: bool,
    ) -> Result<(), CacheError> {
        if !cache_only {
            return self.add_user_groups(user_name, &[group_name]).await;
        }
        let Some(inner) = &self.inner else { return Ok(()) };
        if let (Some(user), Some(group)) = (user_name, group_name) {
            inner
                .add_user_to_groups_in_cache(user, &[group.to_owned()])
                .await;
            inner.drain().await;
        }
        Ok(())
    }

    /// Revoke a membership, remove a user, or remove a group, depending on
    /// which names are given; optionally touching only the indexes.
    pub async fn remove_user_group_tx(
        &self,
        user_name: Option<&str>,
        group_name: Option<&str>,
        cache_only: bool,
    ) -> Result<(), CacheError> {
        match (user_name, group_name) {
            (Some(user), None) if cache_only => {
                self.remove_user_from_cache(user).await;
                Ok(())
            }
            (None, Some(group)) if cache_only => {
                self.remove_group_from_cache(group).await;
                Ok(())
            }
            (Some(user), Some(group)) if cache_only => {
                let Some(inner) = &self.inner else { return Ok(()) };
                inner.indexes.drop_group_from_user(user, group).await;
                inner.indexes.drop_user_from_group(group, user).await;
                inner.drain().await;
                Ok(())
            }
            (Some(user), None) => self.remove_user(user).await,
            (None, Some(group)) => self.remove_group(group).await,
            (Some(user), Some(group)) => self.remove_user_from_group(user, group).await,
            (None, None) => Ok(()),
        }
    }

    // ---- maintenance ----------------------------------------------------

    /// Invalidate every entry in all six indexes and settle the resulting
    /// cascade.
    pub async fn clear(&self) {
        let Some(inner) = &self.inner else { return };
        debug!("clearing all directory indexes");
        inner.indexes.users_to_groups.invalidate_all();
        inner.indexes.groups_to_users.invalidate_all();
        inner.indexes.ids_to_users.invalidate_all();
        inner.indexes.users_to_ids.invalidate_all();
        inner.indexes.ids_to_groups.invalidate_all();
        inner.indexes.groups_to_ids.invalidate_all();
        self.run_pending_tasks().await;
    }

    /// Drive index housekeeping (TTL and capacity evictions) and apply the
    /// coherence queue until quiescent.
    ///
    /// Expired entries stop being returned immediately, but their eviction
    /// notifications are delivered by housekeeping; call this from a
    /// maintenance loop (or a test) to bound how long the derived indexes
    /// lag behind.
    pub async fn run_pending_tasks(&self) {
        let Some(inner) = &self.inner else { return };
        loop {
            inner.indexes.users_to_ids.run_pending_tasks().await;
            inner.indexes.ids_to_users.run_pending_tasks().await;
            inner.indexes.groups_to_ids.run_pending_tasks().await;
            inner.indexes.ids_to_groups.run_pending_tasks().await;
            inner.indexes.users_to_groups.run_pending_tasks().await;
            inner.indexes.groups_to_users.run_pending_tasks().await;
            if inner.drain_blocking().await == 0 {
                break;
            }
        }
    }

    // ---- cache-only reads -----------------------------------------------

    /// The cached id for a user name, `0` when absent. Never loads.
    pub async fn user_id_from_cache(&self, user_name: &str) -> i64 {
        match &self.inner {
            Some(inner) => inner.indexes.users_to_ids.get(user_name).await.unwrap_or(0),
            None => 0,
        }
    }

    /// The cached name for a user id. Never loads.
    pub async fn user_name_from_cache(&self, user_id: i64) -> Option<String> {
        match &self.inner {
            Some(inner) => inner.indexes.ids_to_users.get(&user_id).await,
            None => None,
        }
    }

    /// The cached id for a group name, `0` when absent. Never loads.
    pub async fn group_id_from_cache(&self, group_name: &str) -> i64 {
        match &self.inner {
            Some(inner) => inner.indexes.groups_to_ids.get(group_name).await.unwrap_or(0),
            None => 0,
        }
    }

    /// The cached name for a group id. Never loads.
    pub async fn group_name_from_cache(&self, group_id: i64) -> Option<String> {
        match &self.inner {
            Some(inner) => inner.indexes.ids_to_groups.get(&group_id).await,
            None => None,
        }
    }

    /// The cached group list for a user. Never loads.
    pub async fn groups_from_cache(&self, user_name: &str) -> Option<Vec<String>> {
        match &self.inner {
            Some(inner) => inner.indexes.users_to_groups.get(user_name).await,
            None => None,
        }
    }

    /// The cached user list for a group. There is no loader for this index:
    /// `None` means "not materialized", never "not in the directory".
    pub async fn group_users_from_cache(&self, group_name: &str) -> Option<Vec<String>> {
        match &self.inner {
            Some(inner) => inner.indexes.groups_to_users.get(group_name).await,
            None => None,
        }
    }
}

impl CacheInner {
    // ---- loaders --------------------------------------------------------
    //
    // Each loader runs inside the index's single-flight slot for its key and
    // back-fills the sibling indexes before returning, so a follow-up lookup
    // by the other key hits.

    async fn load_user_id(&self, user_name: &str) -> Result<i64, LoadError> {
        debug!(user = %user_name, "loading user id from the directory");
        let user = self
            .directory
            .user_by_name(user_name)
            .await
            .map_err(LoadError::Directory)?;
        let Some(user) = user else {
            return Err(LoadError::NotFound);
        };
        self.indexes.ids_to_users.insert(user.id, user.name).await;
        Ok(user.id)
    }

    async fn load_user_name(&self, user_id: i64) -> Result<String, LoadError> {
        debug!(id = user_id, "loading user name from the directory");
        let user = self
            .directory
            .user_by_id(user_id)
            .await
            .map_err(LoadError::Directory)?;
        let Some(user) = user else {
            return Err(LoadError::NotFound);
        };
        self.indexes.users_to_ids.insert(user.name.clone(), user.id).await;
        Ok(user.name)
    }

    async fn load_group_id(&self, group_name: &str) -> Result<i64, LoadError> {
        debug!(group = %group_name, "loading group id from the directory");
        let group = self
            .directory
            .group_by_name(group_name)
            .await
            .map_err(LoadError::Directory)?;
        let Some(group) = group else {
            return Err(LoadError::NotFound);
        };
        self.indexes.ids_to_groups.insert(group.id, group.name).await;
        Ok(group.id)
    }

    async fn load_group_name(&self, group_id: i64) -> Result<String, LoadError> {
        debug!(id = group_id, "loading group name from the directory");
        let group = self
            .directory
            .group_by_id(group_id)
            .await
            .map_err(LoadError::Directory)?;
        let Some(group) = group else {
            return Err(LoadError::NotFound);
        };
        self.indexes.groups_to_ids.insert(group.name.clone(), group.id).await;
        Ok(group.name)
    }

    /// Load a user's memberships in one unit of work, back-filling the group
    /// bijection indexes and the reverse index for every group returned. A
    /// user with no groups loads as not-found.
    async fn load_user_groups(&self, user_name: &str) -> Result<Vec<String>, LoadError> {
        debug!(user = %user_name, "loading group memberships from the directory");
        let groups = self
            .directory
            .user_groups(user_name)
            .await
            .map_err(LoadError::Directory)?;
        let Some(groups) = groups else {
            return Err(LoadError::NotFound);
        };
        if groups.is_empty() {
            return Err(LoadError::NotFound);
        }

        let mut names = Vec::with_capacity(groups.len());
        for group in groups {
            self.indexes.groups_to_ids.insert(group.name.clone(), group.id).await;
            self.indexes.ids_to_groups.insert(group.id, group.name.clone()).await;
            self.indexes.append_user_to_group(&group.name, user_name).await;
            names.push(group.name);
        }
        Ok(names)
    }

    // ---- write helpers --------------------------------------------------

    async fn add_user_groups_once(
        &self,
        user_name: Option<&str>,
        groups: &[&str],
    ) -> Result<(), CacheError> {
        let mut user_id = None;
        if let Some(user) = user_name {
            if !groups.is_empty() {
                if let Some(cached) = self.indexes.users_to_groups.get(user).await {
                    if groups.iter().all(|g| cached.iter().any(|have| have == g)) {
                        debug!(user = %user, "requested groups already cached for user");
                        return Ok(());
                    }
                }
            }
            user_id = Some(self.ensure_user(user).await?);
        }

        if groups.is_empty() {
            return Ok(());
        }

        let mut group_ids = Vec::with_capacity(groups.len());
        for group in groups {
            group_ids.push(self.ensure_group(group).await?);
        }

        if let (Some(user), Some(user_id)) = (user_name, user_id) {
            // Write only the rows the cached list does not already prove;
            // a duplicate batch member would reject the whole unit of work.
            let cached = self.indexes.users_to_groups.get(user).await.unwrap_or_default();
            let mut missing_ids = Vec::with_capacity(group_ids.len());
            for (group, id) in groups.iter().zip(&group_ids) {
                if !cached.iter().any(|have| have == group) {
                    missing_ids.push(*id);
                }
            }
            if !missing_ids.is_empty() {
                match self.directory.add_user_to_groups(user_id, &missing_ids).await {
                    Ok(()) => {}
                    Err(DirectoryError::UniqueKey(cause)) => {
                        debug!(%cause, "membership rows already present in the directory");
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            let groups: Vec<String> = groups.iter().map(|g| (*g).to_owned()).collect();
            self.add_user_to_groups_in_cache(user, &groups).await;
        }
        Ok(())
    }

    /// The cached id for the user, creating the user in the directory when
    /// the name index has no entry.
    async fn ensure_user(&self, user_name: &str) -> Result<i64, CacheError> {
        if let Some(id) = self.indexes.users_to_ids.get(user_name).await {
            debug!(user = %user_name, id, "user already cached");
            return Ok(id);
        }
        let user = self.directory.add_user(user_name).await?;
        debug!(user = %user.name, id = user.id, "user added to the directory");
        self.indexes.ids_to_users.insert(user.id, user.name.clone()).await;
        self.indexes.users_to_ids.insert(user.name, user.id).await;
        Ok(user.id)
    }

    /// The cached id for the group, creating the group in the directory when
    /// the name index has no entry.
    async fn ensure_group(&self, group_name: &str) -> Result<i64, CacheError> {
        if let Some(id) = self.indexes.groups_to_ids.get(group_name).await {
            debug!(group = %group_name, id, "group already cached");
            return Ok(id);
        }
        let group = self.directory.add_group(group_name).await?;
        debug!(group = %group.name, id = group.id, "group added to the directory");
        self.indexes.ids_to_groups.insert(group.id, group.name.clone()).await;
        self.indexes.groups_to_ids.insert(group.name, group.id).await;
        Ok(group.id)
    }

    /// Merge `groups` into the user's group list and list the user under
    /// every group it was not already under.
    async fn add_user_to_groups_in_cache(&self, user: &str, groups: &[String]) {
        let added = self.indexes.merge_user_groups(user, groups).await;
        for group in &added {
            self.indexes.append_user_to_group(group, user).await;
        }
    }

    async fn invalidate_user_entries(&self, user_name: &str, user_id: i64) {
        self.indexes.users_to_ids.invalidate(user_name).await;
        if user_id != 0 {
            self.indexes.ids_to_users.invalidate(&user_id).await;
        }
        self.indexes.users_to_groups.invalidate(user_name).await;
    }

    async fn invalidate_group_entries(&self, group_name: &str, group_id: i64) {
        self.indexes.groups_to_ids.invalidate(group_name).await;
        if group_id != 0 {
            self.indexes.ids_to_groups.invalidate(&group_id).await;
        }
        self.indexes.groups_to_users.invalidate(group_name).await;
    }

    // ---- coherence queue -------------------------------------------------

    /// Apply queued eviction events. Skips silently when another task is
    /// already draining; that task will pick up whatever is queued.
    async fn drain(&self) -> usize {
        match self.events.try_lock() {
            Ok(receiver) => self.apply_events(receiver).await,
            Err(_) => 0,
        }
    }

    /// Apply queued eviction events, waiting for the queue if contended.
    async fn drain_blocking(&self) -> usize {
        let receiver = self.events.lock().await;
        self.apply_events(receiver).await
    }

    async fn apply_events(
        &self,
        mut receiver: tokio::sync::MutexGuard<'_, UnboundedReceiver<Eviction>>,
    ) -> usize {
        let mut applied = 0;
        while let Ok(event) = receiver.try_recv() {
            self.indexes.apply(event).await;
            applied += 1;
        }
        applied
    }
}
