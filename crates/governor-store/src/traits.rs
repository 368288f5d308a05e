//! Store trait: the abstract interface for permission and grant persistence.
//!
//! The resolver and materializer only ever talk to storage through this
//! trait. Implementations include SQLite (primary) and in-memory (for tests).

use std::collections::BTreeSet;

use async_trait::async_trait;
use governor_core::{
    GrantBatch, GrantCounts, Group, GroupId, LifecycleEvent, ObjectId, ObjectRef, ObjectType,
    Permission, PermissionName, User, UserId,
};

use crate::error::Result;

/// Result of saving a user, group or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// The entity did not exist before.
    Created,
    /// The entity already existed and was overwritten.
    Updated,
}

impl From<SaveResult> for LifecycleEvent {
    fn from(result: SaveResult) -> Self {
        match result {
            SaveResult::Created => LifecycleEvent::Created,
            SaveResult::Updated => LifecycleEvent::Updated,
        }
    }
}

/// The Store trait: async interface for permissions, principals, objects
/// and grants.
///
/// # Design Notes
///
/// - **Identity lookups drop unknown ids**: `*_by_ids` return only records
///   that exist, each once, ordered by id.
/// - **Atomic batches**: [`Store::insert_grants`] either persists the whole
///   batch or nothing.
/// - **Unique grants**: inserting a grant that already exists fails the
///   batch with [`StoreError::Conflict`](crate::StoreError::Conflict).
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Define a permission. Redefining an existing name updates its object type.
    async fn insert_permission(&self, permission: &Permission) -> Result<()>;

    /// Look up a permission by `(namespace, codename)`.
    async fn get_permission(&self, name: &PermissionName) -> Result<Option<Permission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Principals and objects
    // ─────────────────────────────────────────────────────────────────────────

    async fn save_user(&self, user: &User) -> Result<SaveResult>;

    async fn save_group(&self, group: &Group) -> Result<SaveResult>;

    async fn save_object(&self, object: &ObjectRef) -> Result<SaveResult>;

    /// Record that `user` is a member of `group`.
    async fn add_group_member(&self, group: GroupId, user: UserId) -> Result<()>;

    async fn users_by_ids(&self, ids: &BTreeSet<UserId>) -> Result<Vec<User>>;

    async fn groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> Result<Vec<Group>>;

    async fn objects_by_ids(
        &self,
        object_type: &ObjectType,
        ids: &BTreeSet<ObjectId>,
    ) -> Result<Vec<ObjectRef>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Existing grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Users holding `permission` on `object`.
    async fn users_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<UserId>>;

    /// Groups holding `permission` on `object`.
    async fn groups_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<GroupId>>;

    /// Objects of the permission's object type `user` holds `permission` on.
    async fn objects_granted_to_user(
        &self,
        permission: &Permission,
        user: UserId,
    ) -> Result<BTreeSet<ObjectId>>;

    /// Objects of the permission's object type `group` holds `permission` on.
    async fn objects_granted_to_group(
        &self,
        permission: &Permission,
        group: GroupId,
    ) -> Result<BTreeSet<ObjectId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes and checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert every grant in `batch` in one transaction.
    ///
    /// Returns the number of records inserted.
    async fn insert_grants(&self, batch: &GrantBatch) -> Result<usize>;

    /// True if `user` holds `permission` on `object` directly or through
    /// one of its groups.
    async fn user_has_permission(
        &self,
        user: UserId,
        permission: &PermissionName,
        object: &ObjectRef,
    ) -> Result<bool>;

    /// Total number of grant records.
    async fn grant_counts(&self) -> Result<GrantCounts>;
}
