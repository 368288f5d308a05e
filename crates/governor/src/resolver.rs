//! The eligibility resolver.
//!
//! For a permission and an anchor (an object, a user or a group) the
//! resolver asks every role registered for the permission for candidates,
//! unions them by identity, optionally drops the ones that already hold the
//! grant, and resolves the rest into stored records.

use std::collections::BTreeSet;
use std::sync::Arc;

use governor_core::{
    Direction, Group, ObjectRef, Permission, PermissionRef, Registry, Role, RoleResult, User,
};
use governor_store::Store;

use crate::error::{GovernorError, Result};
use crate::lookup;

/// Evaluates registered roles against a domain model `D` and storage `S`.
pub struct Resolver<S: ?Sized, D: ?Sized> {
    store: Arc<S>,
    registry: Arc<Registry<D>>,
    domain: Arc<D>,
}

impl<S: ?Sized, D: ?Sized> Clone for Resolver<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            domain: Arc::clone(&self.domain),
        }
    }
}

impl<S, D> Resolver<S, D>
where
    S: Store + ?Sized,
    D: Send + Sync + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, registry: Arc<Registry<D>>, domain: Arc<D>) -> Self {
        Self {
            store,
            registry,
            domain,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry<D> {
        &self.registry
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Resolve a permission reference against storage.
    pub async fn resolve_permission(
        &self,
        reference: impl Into<PermissionRef>,
        sample: Option<&ObjectRef>,
    ) -> Result<Permission> {
        lookup::resolve_permission(&*self.store, reference, sample).await
    }

    /// Users eligible to hold `permission` on `object`.
    ///
    /// With `exclude_existing`, users already holding the grant are left out.
    pub async fn users_eligible_for_object(
        &self,
        permission: impl Into<PermissionRef>,
        object: &ObjectRef,
        exclude_existing: bool,
    ) -> Result<Vec<User>> {
        let permission = self.resolve_permission(permission, Some(object)).await?;
        let mut eligible =
            self.compute_eligible(&permission, Direction::UsersForObject, |role, domain| {
                role.users_eligible_for_object(domain, object, &permission)
            })?;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        if exclude_existing {
            let existing = self
                .store
                .users_granted_on_object(&permission, object)
                .await?;
            eligible.retain(|id| !existing.contains(id));
        }

        Ok(self.store.users_by_ids(&eligible).await?)
    }

    /// Groups eligible to hold `permission` on `object`.
    pub async fn groups_eligible_for_object(
        &self,
        permission: impl Into<PermissionRef>,
        object: &ObjectRef,
        exclude_existing: bool,
    ) -> Result<Vec<Group>> {
        let permission = self.resolve_permission(permission, Some(object)).await?;
        let mut eligible =
            self.compute_eligible(&permission, Direction::GroupsForObject, |role, domain| {
                role.groups_eligible_for_object(domain, object, &permission)
            })?;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        if exclude_existing {
            let existing = self
                .store
                .groups_granted_on_object(&permission, object)
                .await?;
            eligible.retain(|id| !existing.contains(id));
        }

        Ok(self.store.groups_by_ids(&eligible).await?)
    }

    /// Objects of the permission's object type that `user` is eligible for.
    pub async fn objects_eligible_for_user(
        &self,
        permission: impl Into<PermissionRef>,
        user: &User,
        exclude_existing: bool,
    ) -> Result<Vec<ObjectRef>> {
        let permission = self.resolve_permission(permission, None).await?;
        let mut eligible =
            self.compute_eligible(&permission, Direction::ObjectsForUser, |role, domain| {
                role.objects_eligible_for_user(domain, user, &permission)
            })?;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        if exclude_existing {
            let existing = self
                .store
                .objects_granted_to_user(&permission, user.id)
                .await?;
            eligible.retain(|id| !existing.contains(id));
        }

        Ok(self
            .store
            .objects_by_ids(&permission.object_type, &eligible)
            .await?)
    }

    /// Objects of the permission's object type that `group` is eligible for.
    pub async fn objects_eligible_for_group(
        &self,
        permission: impl Into<PermissionRef>,
        group: &Group,
        exclude_existing: bool,
    ) -> Result<Vec<ObjectRef>> {
        let permission = self.resolve_permission(permission, None).await?;
        let mut eligible =
            self.compute_eligible(&permission, Direction::ObjectsForGroup, |role, domain| {
                role.objects_eligible_for_group(domain, group, &permission)
            })?;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        if exclude_existing {
            let existing = self
                .store
                .objects_granted_to_group(&permission, group.id)
                .await?;
            eligible.retain(|id| !existing.contains(id));
        }

        Ok(self
            .store
            .objects_by_ids(&permission.object_type, &eligible)
            .await?)
    }

    /// Union of the candidate identities every registered role returns.
    ///
    /// A permission without roles yields an empty set. Role errors are not
    /// caught.
    fn compute_eligible<Id, F>(
        &self,
        permission: &Permission,
        direction: Direction,
        mut evaluate: F,
    ) -> Result<BTreeSet<Id>>
    where
        Id: Ord,
        F: FnMut(&dyn Role<D>, &D) -> RoleResult<Vec<Id>>,
    {
        let roles = self.registry.roles_for_permission(permission);
        if roles.is_empty() {
            tracing::debug!(permission = %permission, %direction, "no roles registered");
            return Ok(BTreeSet::new());
        }

        let mut eligible = BTreeSet::new();
        for role in roles {
            let candidates =
                evaluate(role.as_ref(), &self.domain).map_err(|source| GovernorError::Role {
                    role: role.name(),
                    direction,
                    permission: permission.name.clone(),
                    source,
                })?;
            tracing::debug!(
                role = role.name(),
                permission = %permission,
                %direction,
                candidates = candidates.len(),
                "evaluated role"
            );
            eligible.extend(candidates);
        }

        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor_core::{
        GrantBatch, GroupGrant, GroupId, ObjectId, ObjectType, PermissionName, UserGrant, UserId,
    };
    use governor_store::MemoryStore;
    use proptest::prelude::*;

    /// Candidate lists handed to the roles, keyed by nothing: every call
    /// returns the same lists.
    #[derive(Default)]
    struct Fixed {
        users_a: Vec<i64>,
        users_b: Vec<i64>,
        groups: Vec<i64>,
        objects: Vec<i64>,
        fail: bool,
    }

    #[derive(Default)]
    struct RoleA;

    impl Role<Fixed> for RoleA {
        fn users_eligible_for_object(
            &self,
            domain: &Fixed,
            _object: &ObjectRef,
            _permission: &Permission,
        ) -> RoleResult<Vec<UserId>> {
            if domain.fail {
                anyhow::bail!("newspaper missing");
            }
            Ok(domain.users_a.iter().copied().map(UserId).collect())
        }

        fn groups_eligible_for_object(
            &self,
            domain: &Fixed,
            _object: &ObjectRef,
            _permission: &Permission,
        ) -> RoleResult<Vec<GroupId>> {
            Ok(domain.groups.iter().copied().map(GroupId).collect())
        }

        fn objects_eligible_for_user(
            &self,
            domain: &Fixed,
            _user: &User,
            _permission: &Permission,
        ) -> RoleResult<Vec<ObjectId>> {
            Ok(domain.objects.iter().copied().map(ObjectId).collect())
        }
    }

    #[derive(Default)]
    struct RoleB;

    impl Role<Fixed> for RoleB {
        fn users_eligible_for_object(
            &self,
            domain: &Fixed,
            _object: &ObjectRef,
            _permission: &Permission,
        ) -> RoleResult<Vec<UserId>> {
            Ok(domain.users_b.iter().copied().map(UserId).collect())
        }
    }

    fn document() -> ObjectType {
        ObjectType::new("docs", "document")
    }

    fn review() -> Permission {
        Permission::new(PermissionName::new("docs", "review"), document())
    }

    fn add() -> Permission {
        Permission::new(PermissionName::new("docs", "add"), document())
    }

    async fn setup(domain: Fixed) -> Resolver<MemoryStore, Fixed> {
        let store = MemoryStore::new();
        store.insert_permission(&review()).await.unwrap();
        store.insert_permission(&add()).await.unwrap();
        for id in 1..=10 {
            store
                .save_user(&User::new(id, format!("user{}", id)))
                .await
                .unwrap();
            store
                .save_group(&Group::new(id, format!("group{}", id)))
                .await
                .unwrap();
            store
                .save_object(&ObjectRef::new(document(), id))
                .await
                .unwrap();
        }

        let mut registry = Registry::new();
        registry.register::<RoleA>(&["docs.review"]).unwrap();
        registry.register::<RoleB>(&["docs.review"]).unwrap();

        Resolver::new(Arc::new(store), Arc::new(registry), Arc::new(domain))
    }

    fn ids(users: &[User]) -> Vec<i64> {
        users.iter().map(|u| u.id.get()).collect()
    }

    #[tokio::test]
    async fn test_no_roles_is_empty() {
        let resolver = setup(Fixed::default()).await;
        let obj = ObjectRef::new(document(), 1);

        assert!(resolver
            .users_eligible_for_object("docs.add", &obj, true)
            .await
            .unwrap()
            .is_empty());
        assert!(resolver
            .groups_eligible_for_object("docs.add", &obj, true)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_union_is_distinct() {
        let resolver = setup(Fixed {
            users_a: vec![1, 2, 2, 3],
            users_b: vec![3, 4],
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);

        let users = resolver
            .users_eligible_for_object("docs.review", &obj, false)
            .await
            .unwrap();
        assert_eq!(ids(&users), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_dropped() {
        let resolver = setup(Fixed {
            users_a: vec![1, 99],
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);

        let users = resolver
            .users_eligible_for_object("docs.review", &obj, false)
            .await
            .unwrap();
        assert_eq!(ids(&users), vec![1]);
    }

    #[tokio::test]
    async fn test_exclusion_toggle() {
        let resolver = setup(Fixed {
            users_a: vec![1, 2],
            groups: vec![5],
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);
        resolver
            .store()
            .insert_grants(&GrantBatch {
                users: vec![UserGrant {
                    user: UserId(1),
                    permission: review(),
                    object: obj.clone(),
                }],
                groups: vec![GroupGrant {
                    group: GroupId(5),
                    permission: review(),
                    object: obj.clone(),
                }],
            })
            .await
            .unwrap();

        let excluded = resolver
            .users_eligible_for_object("docs.review", &obj, true)
            .await
            .unwrap();
        assert_eq!(ids(&excluded), vec![2]);

        let raw = resolver
            .users_eligible_for_object("docs.review", &obj, false)
            .await
            .unwrap();
        assert_eq!(ids(&raw), vec![1, 2]);

        let groups = resolver
            .groups_eligible_for_object("docs.review", &obj, true)
            .await
            .unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_objects_for_user_excludes_granted() {
        let resolver = setup(Fixed {
            objects: vec![1, 2, 3],
            ..Default::default()
        })
        .await;
        let user = User::new(4, "user4");
        resolver
            .store()
            .insert_grants(&GrantBatch {
                users: vec![UserGrant {
                    user: user.id,
                    permission: review(),
                    object: ObjectRef::new(document(), 2),
                }],
                groups: vec![],
            })
            .await
            .unwrap();

        let objs = resolver
            .objects_eligible_for_user("docs.review", &user, true)
            .await
            .unwrap();
        let got: Vec<_> = objs.iter().map(|o| o.id.get()).collect();
        assert_eq!(got, vec![1, 3]);
        assert!(objs.iter().all(|o| o.object_type == document()));
    }

    #[tokio::test]
    async fn test_objects_for_group_without_capability_is_empty() {
        let resolver = setup(Fixed {
            objects: vec![1, 2, 3],
            ..Default::default()
        })
        .await;
        let objs = resolver
            .objects_eligible_for_group("docs.review", &Group::new(1, "group1"), true)
            .await
            .unwrap();
        assert!(objs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_permission_fails_before_roles() {
        let resolver = setup(Fixed {
            fail: true,
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);
        let err = resolver
            .users_eligible_for_object("docs.delete", &obj, true)
            .await
            .unwrap_err();
        assert!(err.is_lookup_error());
    }

    #[tokio::test]
    async fn test_role_failure_propagates() {
        let resolver = setup(Fixed {
            fail: true,
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);
        let err = resolver
            .users_eligible_for_object("docs.review", &obj, true)
            .await
            .unwrap_err();
        match err {
            GovernorError::Role {
                role,
                direction,
                source,
                ..
            } => {
                assert!(role.ends_with("RoleA"));
                assert_eq!(direction, Direction::UsersForObject);
                assert_eq!(source.to_string(), "newspaper missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_bare_codename_uses_object_namespace() {
        let resolver = setup(Fixed {
            users_a: vec![1],
            ..Default::default()
        })
        .await;
        let obj = ObjectRef::new(document(), 1);
        let users = resolver
            .users_eligible_for_object("review", &obj, false)
            .await
            .unwrap();
        assert_eq!(ids(&users), vec![1]);
    }

    proptest! {
        #[test]
        fn union_contains_each_identity_once(
            a in proptest::collection::vec(1i64..=10, 0..12),
            b in proptest::collection::vec(1i64..=10, 0..12),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let expected: BTreeSet<i64> = a.iter().chain(&b).copied().collect();
            let users = rt.block_on(async {
                let resolver = setup(Fixed { users_a: a, users_b: b, ..Default::default() }).await;
                resolver
                    .users_eligible_for_object("docs.review", &ObjectRef::new(document(), 1), false)
                    .await
                    .unwrap()
            });
            let got = ids(&users);
            prop_assert_eq!(got.len(), expected.len());
            prop_assert_eq!(got, expected.into_iter().collect::<Vec<_>>());
        }
    }
}
