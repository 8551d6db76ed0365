//! Directory access seams and the unit-of-work gateway
//!
//! The persistent users-and-groups directory is an external collaborator.
//! This module defines the narrow capability set the cache needs from it:
//! - [`UserAccess`] / [`GroupAccess`]: name/id lookup, insert, delete
//! - [`MembershipAccess`]: the many-to-many user↔group relation
//! - [`DirectoryConnector`]: optional transaction control for stores whose
//!   reads should participate in an enclosing transaction
//!
//! Implementations can be SQL, a clustered metadata store, or anything else.
//! Absence of a record is `Ok(None)`; classified constraint violations and
//! storage faults are [`DirectoryError`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DirectoryError;

/// A directory user row. Ids are positive; `0` never names a real user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A directory group row. Same shape as [`User`], disjoint namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// Access to the users table. Each call is one unit of work.
#[async_trait]
pub trait UserAccess: Send + Sync {
    async fn user_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError>;

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError>;

    /// Insert a new user and return the stored row. An existing name is a
    /// unique-key violation.
    async fn add_user(&self, name: &str) -> Result<User, DirectoryError>;

    async fn remove_user(&self, id: i64) -> Result<(), DirectoryError>;
}

/// Access to the groups table. Each call is one unit of work.
#[async_trait]
pub trait GroupAccess: Send + Sync {
    async fn group_by_name(&self, name: &str) -> Result<Option<Group>, DirectoryError>;

    async fn group_by_id(&self, id: i64) -> Result<Option<Group>, DirectoryError>;

    /// Insert a new group and return the stored row. An existing name is a
    /// unique-key violation.
    async fn add_group(&self, name: &str) -> Result<Group, DirectoryError>;

    async fn remove_group(&self, id: i64) -> Result<(), DirectoryError>;
}

/// Access to the membership relation. Each call is one unit of work.
#[async_trait]
pub trait MembershipAccess: Send + Sync {
    /// Insert the membership rows `(user_id, group_id)` as a single unit.
    /// A missing user or group row is a foreign-key violation; an existing
    /// row is a unique-key violation.
    async fn add_user_to_groups(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<(), DirectoryError>;

    async fn remove_user_from_group(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<(), DirectoryError>;

    /// All groups the user belongs to, in storage order.
    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<Group>, DirectoryError>;
}

/// Transaction control for stores whose multi-step reads should join an
/// already-active transaction instead of opening their own.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn is_transaction_active(&self) -> bool;

    async fn begin_transaction(&self) -> Result<(), DirectoryError>;

    async fn commit(&self) -> Result<(), DirectoryError>;

    async fn rollback(&self) -> Result<(), DirectoryError>;
}

/// Composes the three access seams into the units of work the cache needs.
pub(crate) struct DirectoryGateway {
    users: Arc<dyn UserAccess>,
    groups: Arc<dyn GroupAccess>,
    memberships: Arc<dyn MembershipAccess>,
    connector: Option<Arc<dyn DirectoryConnector>>,
}

impl DirectoryGateway {
    pub(crate) fn new(
        users: Arc<dyn UserAccess>,
        groups: Arc<dyn GroupAccess>,
        memberships: Arc<dyn MembershipAccess>,
        connector: Option<Arc<dyn DirectoryConnector>>,
    ) -> Self {
        Self {
            users,
            groups,
            memberships,
            connector,
        }
    }

    pub(crate) async fn user_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError> {
        self.users.user_by_name(name).await
    }

    pub(crate) async fn user_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        self.users.user_by_id(id).await
    }

    pub(crate) async fn add_user(&self, name: &str) -> Result<User, DirectoryError> {
        self.users.add_user(name).await
    }

    pub(crate) async fn remove_user(&self, id: i64) -> Result<(), DirectoryError> {
        self.users.remove_user(id).await
    }

    pub(crate) async fn group_by_name(&self, name: &str) -> Result<Option<Group>, DirectoryError> {
        self.groups.group_by_name(name).await
    }

    pub(crate) async fn group_by_id(&self, id: i64) -> Result<Option<Group>, DirectoryError> {
        self.groups.group_by_id(id).await
    }

    pub(crate) async fn add_group(&self, name: &str) -> Result<Group, DirectoryError> {
        self.groups.add_group(name).await
    }

    pub(crate) async fn remove_group(&self, id: i64) -> Result<(), DirectoryError> {
        self.groups.remove_group(id).await
    }

    pub(crate) async fn add_user_to_groups(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<(), DirectoryError> {
        self.memberships.add_user_to_groups(user_id, group_ids).await
    }

    pub(crate) async fn remove_user_from_group(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<(), DirectoryError> {
        self.memberships.remove_user_from_group(user_id, group_id).await
    }

    /// Combined user-row + membership read, returning `None` when the user
    /// does not exist.
    ///
    /// When a connector is wired the two reads run inside one transaction:
    /// an already-active transaction is joined and left alone; otherwise one
    /// is opened here, committed on success and rolled back on fault.
    pub(crate) async fn user_groups(&self, name: &str) -> Result<Option<Vec<Group>>, DirectoryError> {
        let Some(connector) = &self.connector else {
            return self.user_groups_inner(name).await;
        };

        let started = !connector.is_transaction_active().await;
        if started {
            connector.begin_transaction().await?;
        }

        let result = self.user_groups_inner(name).await;

        if started {
            match &result {
                Ok(_) => connector.commit().await?,
                Err(_) => {
                    let _ = connector.rollback().await;
                }
            }
        }
        result
    }

    async fn user_groups_inner(&self, name: &str) -> Result<Option<Vec<Group>>, DirectoryError> {
        let Some(user) = self.users.user_by_name(name).await? else {
            return Ok(None);
        };
        let groups = self.memberships.groups_for_user(user.id).await?;
        Ok(Some(groups))
    }
}
