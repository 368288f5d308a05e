//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use governor_core::{
    GrantBatch, GrantCounts, Group, GroupId, ObjectId, ObjectRef, ObjectType, Permission,
    PermissionName, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{SaveResult, Store};

type UserGrantKey = (UserId, PermissionName, ObjectRef);
type GroupGrantKey = (GroupId, PermissionName, ObjectRef);

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    permissions: HashMap<PermissionName, Permission>,
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    /// Group membership: (group, user).
    members: BTreeSet<(GroupId, UserId)>,
    objects: BTreeSet<ObjectRef>,
    user_grants: HashSet<UserGrantKey>,
    group_grants: HashSet<GroupGrantKey>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Worker(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Worker(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Check that every grant in `batch` references known records and is
    /// new, including against earlier grants of the same batch.
    fn validate_batch(&self, batch: &GrantBatch) -> Result<()> {
        let mut pending_users = HashSet::new();
        for g in &batch.users {
            self.check_refs(&g.permission, &g.object)?;
            if !self.users.contains_key(&g.user) {
                return Err(StoreError::NotFound(format!("user {}", g.user)));
            }
            let key = (g.user, g.permission.name.clone(), g.object.clone());
            if self.user_grants.contains(&key) || !pending_users.insert(key) {
                return Err(StoreError::Conflict(format!(
                    "user {} already holds {} on {}",
                    g.user, g.permission, g.object
                )));
            }
        }

        let mut pending_groups = HashSet::new();
        for g in &batch.groups {
            self.check_refs(&g.permission, &g.object)?;
            if !self.groups.contains_key(&g.group) {
                return Err(StoreError::NotFound(format!("group {}", g.group)));
            }
            let key = (g.group, g.permission.name.clone(), g.object.clone());
            if self.group_grants.contains(&key) || !pending_groups.insert(key) {
                return Err(StoreError::Conflict(format!(
                    "group {} already holds {} on {}",
                    g.group, g.permission, g.object
                )));
            }
        }

        Ok(())
    }

    fn check_refs(&self, permission: &Permission, object: &ObjectRef) -> Result<()> {
        if !self.permissions.contains_key(&permission.name) {
            return Err(StoreError::NotFound(format!("permission {}", permission)));
        }
        if !self.objects.contains(object) {
            return Err(StoreError::NotFound(format!("object {}", object)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .permissions
            .insert(permission.name.clone(), permission.clone());
        Ok(())
    }

    async fn get_permission(&self, name: &PermissionName) -> Result<Option<Permission>> {
        let inner = self.read()?;
        Ok(inner.permissions.get(name).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<SaveResult> {
        let mut inner = self.write()?;
        Ok(match inner.users.insert(user.id, user.clone()) {
            Some(_) => SaveResult::Updated,
            None => SaveResult::Created,
        })
    }

    async fn save_group(&self, group: &Group) -> Result<SaveResult> {
        let mut inner = self.write()?;
        Ok(match inner.groups.insert(group.id, group.clone()) {
            Some(_) => SaveResult::Updated,
            None => SaveResult::Created,
        })
    }

    async fn save_object(&self, object: &ObjectRef) -> Result<SaveResult> {
        let mut inner = self.write()?;
        Ok(if inner.objects.insert(object.clone()) {
            SaveResult::Created
        } else {
            SaveResult::Updated
        })
    }

    async fn add_group_member(&self, group: GroupId, user: UserId) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.groups.contains_key(&group) {
            return Err(StoreError::NotFound(format!("group {}", group)));
        }
        if !inner.users.contains_key(&user) {
            return Err(StoreError::NotFound(format!("user {}", user)));
        }
        inner.members.insert((group, user));
        Ok(())
    }

    async fn users_by_ids(&self, ids: &BTreeSet<UserId>) -> Result<Vec<User>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> Result<Vec<Group>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.groups.get(id).cloned())
            .collect())
    }

    async fn objects_by_ids(
        &self,
        object_type: &ObjectType,
        ids: &BTreeSet<ObjectId>,
    ) -> Result<Vec<ObjectRef>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .map(|id| ObjectRef::new(object_type.clone(), *id))
            .filter(|obj| inner.objects.contains(obj))
            .collect())
    }

    async fn users_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<UserId>> {
        let inner = self.read()?;
        Ok(inner
            .user_grants
            .iter()
            .filter(|(_, perm, obj)| *perm == permission.name && obj == object)
            .map(|(user, _, _)| *user)
            .collect())
    }

    async fn groups_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<GroupId>> {
        let inner = self.read()?;
        Ok(inner
            .group_grants
            .iter()
            .filter(|(_, perm, obj)| *perm == permission.name && obj == object)
            .map(|(group, _, _)| *group)
            .collect())
    }

    async fn objects_granted_to_user(
        &self,
        permission: &Permission,
        user: UserId,
    ) -> Result<BTreeSet<ObjectId>> {
        let inner = self.read()?;
        Ok(inner
            .user_grants
            .iter()
            .filter(|(u, perm, obj)| {
                *u == user && *perm == permission.name && obj.object_type == permission.object_type
            })
            .map(|(_, _, obj)| obj.id)
            .collect())
    }

    async fn objects_granted_to_group(
        &self,
        permission: &Permission,
        group: GroupId,
    ) -> Result<BTreeSet<ObjectId>> {
        let inner = self.read()?;
        Ok(inner
            .group_grants
            .iter()
            .filter(|(g, perm, obj)| {
                *g == group && *perm == permission.name && obj.object_type == permission.object_type
            })
            .map(|(_, _, obj)| obj.id)
            .collect())
    }

    async fn insert_grants(&self, batch: &GrantBatch) -> Result<usize> {
        let mut inner = self.write()?;

        // Validate everything first so a failure leaves no partial batch.
        inner.validate_batch(batch)?;

        for g in &batch.users {
            inner
                .user_grants
                .insert((g.user, g.permission.name.clone(), g.object.clone()));
        }
        for g in &batch.groups {
            inner
                .group_grants
                .insert((g.group, g.permission.name.clone(), g.object.clone()));
        }

        Ok(batch.len())
    }

    async fn user_has_permission(
        &self,
        user: UserId,
        permission: &PermissionName,
        object: &ObjectRef,
    ) -> Result<bool> {
        let inner = self.read()?;

        if inner
            .user_grants
            .contains(&(user, permission.clone(), object.clone()))
        {
            return Ok(true);
        }

        Ok(inner
            .members
            .iter()
            .filter(|(_, member)| *member == user)
            .any(|(group, _)| {
                inner
                    .group_grants
                    .contains(&(*group, permission.clone(), object.clone()))
            }))
    }

    async fn grant_counts(&self) -> Result<GrantCounts> {
        let inner = self.read()?;
        Ok(GrantCounts {
            users: inner.user_grants.len(),
            groups: inner.group_grants.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor_core::{GroupGrant, UserGrant};

    fn document() -> ObjectType {
        ObjectType::new("docs", "document")
    }

    fn review() -> Permission {
        Permission::new(PermissionName::new("docs", "review"), document())
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_permission(&review()).await.unwrap();
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            store.save_user(&User::new(id, name)).await.unwrap();
        }
        store.save_group(&Group::new(1, "Reviewers")).await.unwrap();
        store
            .save_object(&ObjectRef::new(document(), 10))
            .await
            .unwrap();
        store
    }

    fn user_grant(user: i64) -> UserGrant {
        UserGrant {
            user: UserId(user),
            permission: review(),
            object: ObjectRef::new(document(), 10),
        }
    }

    #[tokio::test]
    async fn test_save_reports_created_then_updated() {
        let store = MemoryStore::new();
        let obj = ObjectRef::new(document(), 1);
        assert_eq!(store.save_object(&obj).await.unwrap(), SaveResult::Created);
        assert_eq!(store.save_object(&obj).await.unwrap(), SaveResult::Updated);
    }

    #[tokio::test]
    async fn test_by_ids_drops_unknown() {
        let store = seeded().await;
        let ids: BTreeSet<_> = [UserId(3), UserId(1), UserId(99)].into_iter().collect();
        let users = store.users_by_ids(&ids).await.unwrap();
        let got: Vec<_> = users.iter().map(|u| u.id).collect();
        assert_eq!(got, vec![UserId(1), UserId(3)]);
    }

    #[tokio::test]
    async fn test_insert_grants_and_query() {
        let store = seeded().await;
        let batch = GrantBatch {
            users: vec![user_grant(1), user_grant(2)],
            groups: vec![GroupGrant {
                group: GroupId(1),
                permission: review(),
                object: ObjectRef::new(document(), 10),
            }],
        };
        assert_eq!(store.insert_grants(&batch).await.unwrap(), 3);

        let obj = ObjectRef::new(document(), 10);
        let users = store.users_granted_on_object(&review(), &obj).await.unwrap();
        assert_eq!(users.len(), 2);
        let objs = store.objects_granted_to_user(&review(), UserId(1)).await.unwrap();
        assert!(objs.contains(&ObjectId(10)));
        assert_eq!(
            store.grant_counts().await.unwrap(),
            GrantCounts { users: 2, groups: 1 }
        );
    }

    #[tokio::test]
    async fn test_insert_grants_is_atomic() {
        let store = seeded().await;
        store
            .insert_grants(&GrantBatch {
                users: vec![user_grant(2)],
                groups: vec![],
            })
            .await
            .unwrap();

        // Second grant conflicts, first must not be applied.
        let batch = GrantBatch {
            users: vec![user_grant(1), user_grant(2), user_grant(3)],
            groups: vec![],
        };
        let err = store.insert_grants(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.grant_counts().await.unwrap().users, 1);
    }

    #[tokio::test]
    async fn test_insert_grants_rejects_unknown_user() {
        let store = seeded().await;
        let batch = GrantBatch {
            users: vec![user_grant(1), user_grant(42)],
            groups: vec![],
        };
        assert!(matches!(
            store.insert_grants(&batch).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.grant_counts().await.unwrap().users, 0);
    }

    #[tokio::test]
    async fn test_user_has_permission_through_group() {
        let store = seeded().await;
        store.add_group_member(GroupId(1), UserId(3)).await.unwrap();
        let obj = ObjectRef::new(document(), 10);
        store
            .insert_grants(&GrantBatch {
                users: vec![],
                groups: vec![GroupGrant {
                    group: GroupId(1),
                    permission: review(),
                    object: obj.clone(),
                }],
            })
            .await
            .unwrap();

        assert!(store
            .user_has_permission(UserId(3), &review().name, &obj)
            .await
            .unwrap());
        assert!(!store
            .user_has_permission(UserId(2), &review().name, &obj)
            .await
            .unwrap());
    }
}
