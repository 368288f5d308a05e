//! Grant materialization on entity creation.
//!
//! When a new object, user or group is created, the materializer asks the
//! resolver who (or what) is eligible for each configured permission and
//! persists one grant per eligible counterpart per permission. The whole plan
//! is committed with a single [`Store::insert_grants`] call, so either every
//! grant lands or none does.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use governor_core::{
    GrantBatch, Group, GroupGrant, LifecycleEvent, ObjectRef, Permission, PermissionRef, User,
    UserGrant,
};
use governor_store::Store;

use crate::config::GovernorConfig;
use crate::error::Result;
use crate::resolver::Resolver;

/// What a lifecycle event persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    pub event: LifecycleEvent,
    pub user_grants: usize,
    pub group_grants: usize,
}

impl MaterializeReport {
    fn skipped(event: LifecycleEvent) -> Self {
        Self {
            event,
            user_grants: 0,
            group_grants: 0,
        }
    }

    /// Total number of grants written.
    pub fn total(&self) -> usize {
        self.user_grants + self.group_grants
    }
}

impl fmt::Display for MaterializeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} user grants, {} group grants",
            self.event, self.user_grants, self.group_grants
        )
    }
}

/// Receives lifecycle events after storage has assigned identity.
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn object_saved(
        &self,
        event: LifecycleEvent,
        object: &ObjectRef,
    ) -> Result<MaterializeReport>;

    async fn user_saved(&self, event: LifecycleEvent, user: &User) -> Result<MaterializeReport>;

    async fn group_saved(&self, event: LifecycleEvent, group: &Group) -> Result<MaterializeReport>;
}

/// Plans and commits grants for newly created entities.
pub struct Materializer<S: ?Sized, D: ?Sized> {
    resolver: Resolver<S, D>,
    config: Arc<GovernorConfig>,
}

impl<S: ?Sized, D: ?Sized> Clone for Materializer<S, D> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, D> Materializer<S, D>
where
    S: Store + ?Sized,
    D: Send + Sync + ?Sized + 'static,
{
    pub fn new(resolver: Resolver<S, D>, config: Arc<GovernorConfig>) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &Resolver<S, D> {
        &self.resolver
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    fn exclude_existing(&self) -> bool {
        self.config.exclude_existing_on_create
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Planning
    // ─────────────────────────────────────────────────────────────────────────

    /// One user grant per eligible user per permission on `object`.
    pub async fn plan_users_for_object<I>(
        &self,
        object: &ObjectRef,
        permissions: I,
    ) -> Result<Vec<UserGrant>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let permissions = self.resolve_all(permissions, Some(object)).await?;
        let mut grants = Vec::new();
        for permission in permissions {
            let users = self
                .resolver
                .users_eligible_for_object(&permission, object, self.exclude_existing())
                .await?;
            grants.extend(users.into_iter().map(|user| UserGrant {
                user: user.id,
                permission: permission.clone(),
                object: object.clone(),
            }));
        }
        Ok(grants)
    }

    /// One group grant per eligible group per permission on `object`.
    pub async fn plan_groups_for_object<I>(
        &self,
        object: &ObjectRef,
        permissions: I,
    ) -> Result<Vec<GroupGrant>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let permissions = self.resolve_all(permissions, Some(object)).await?;
        let mut grants = Vec::new();
        for permission in permissions {
            let groups = self
                .resolver
                .groups_eligible_for_object(&permission, object, self.exclude_existing())
                .await?;
            grants.extend(groups.into_iter().map(|group| GroupGrant {
                group: group.id,
                permission: permission.clone(),
                object: object.clone(),
            }));
        }
        Ok(grants)
    }

    /// One user grant per eligible object per permission for `user`.
    pub async fn plan_objects_for_user<I>(
        &self,
        user: &User,
        permissions: I,
    ) -> Result<Vec<UserGrant>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let permissions = self.resolve_all(permissions, None).await?;
        let mut grants = Vec::new();
        for permission in permissions {
            let objects = self
                .resolver
                .objects_eligible_for_user(&permission, user, self.exclude_existing())
                .await?;
            grants.extend(objects.into_iter().map(|object| UserGrant {
                user: user.id,
                permission: permission.clone(),
                object,
            }));
        }
        Ok(grants)
    }

    /// One group grant per eligible object per permission for `group`.
    pub async fn plan_objects_for_group<I>(
        &self,
        group: &Group,
        permissions: I,
    ) -> Result<Vec<GroupGrant>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let permissions = self.resolve_all(permissions, None).await?;
        let mut grants = Vec::new();
        for permission in permissions {
            let objects = self
                .resolver
                .objects_eligible_for_group(&permission, group, self.exclude_existing())
                .await?;
            grants.extend(objects.into_iter().map(|object| GroupGrant {
                group: group.id,
                permission: permission.clone(),
                object,
            }));
        }
        Ok(grants)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setup procedures
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant every eligible user each permission on a newly created object.
    pub async fn setup_users_eligible_for_object<I>(
        &self,
        event: LifecycleEvent,
        object: &ObjectRef,
        permissions: I,
    ) -> Result<MaterializeReport>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        if !event.is_genuine_creation() {
            return Ok(MaterializeReport::skipped(event));
        }
        let users = self.plan_users_for_object(object, permissions).await?;
        self.commit(event, GrantBatch { users, groups: Vec::new() })
            .await
    }

    /// Grant every eligible group each permission on a newly created object.
    pub async fn setup_groups_eligible_for_object<I>(
        &self,
        event: LifecycleEvent,
        object: &ObjectRef,
        permissions: I,
    ) -> Result<MaterializeReport>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        if !event.is_genuine_creation() {
            return Ok(MaterializeReport::skipped(event));
        }
        let groups = self.plan_groups_for_object(object, permissions).await?;
        self.commit(event, GrantBatch { users: Vec::new(), groups })
            .await
    }

    /// Grant a newly created user each permission on every eligible object.
    pub async fn setup_objects_eligible_for_user<I>(
        &self,
        event: LifecycleEvent,
        user: &User,
        permissions: I,
    ) -> Result<MaterializeReport>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        if !event.is_genuine_creation() {
            return Ok(MaterializeReport::skipped(event));
        }
        let users = self.plan_objects_for_user(user, permissions).await?;
        self.commit(event, GrantBatch { users, groups: Vec::new() })
            .await
    }

    /// Grant a newly created group each permission on every eligible object.
    pub async fn setup_objects_eligible_for_group<I>(
        &self,
        event: LifecycleEvent,
        group: &Group,
        permissions: I,
    ) -> Result<MaterializeReport>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        if !event.is_genuine_creation() {
            return Ok(MaterializeReport::skipped(event));
        }
        let groups = self.plan_objects_for_group(group, permissions).await?;
        self.commit(event, GrantBatch { users: Vec::new(), groups })
            .await
    }

    /// Resolve references, keeping the first occurrence of each permission.
    async fn resolve_all<I>(
        &self,
        permissions: I,
        sample: Option<&ObjectRef>,
    ) -> Result<Vec<Permission>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let references: Vec<PermissionRef> = permissions.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(references.len());
        for reference in references {
            let permission = self.resolver.resolve_permission(reference, sample).await?;
            if seen.insert(permission.name.clone()) {
                resolved.push(permission);
            }
        }
        Ok(resolved)
    }

    async fn commit(&self, event: LifecycleEvent, batch: GrantBatch) -> Result<MaterializeReport> {
        let report = MaterializeReport {
            event,
            user_grants: batch.users.len(),
            group_grants: batch.groups.len(),
        };
        if batch.is_empty() {
            tracing::debug!("nothing to materialize");
            return Ok(report);
        }

        match self.resolver.store().insert_grants(&batch).await {
            Ok(_) => {
                tracing::info!(
                    user_grants = report.user_grants,
                    group_grants = report.group_grants,
                    "materialized grants"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, grants = batch.len(), "grant batch rolled back");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<S, D> LifecycleListener for Materializer<S, D>
where
    S: Store + ?Sized + 'static,
    D: Send + Sync + ?Sized + 'static,
{
    /// Runs the users and groups directions configured for the object's
    /// type and commits both in one batch.
    async fn object_saved(
        &self,
        event: LifecycleEvent,
        object: &ObjectRef,
    ) -> Result<MaterializeReport> {
        if !event.is_genuine_creation() {
            return Ok(MaterializeReport::skipped(event));
        }
        let Some(setup) = self.config.object_setup(&object.object_type) else {
            return Ok(MaterializeReport::skipped(event));
        };

        let users = self.plan_users_for_object(object, &setup.users).await?;
        let groups = self.plan_groups_for_object(object, &setup.groups).await?;
        self.commit(event, GrantBatch { users, groups }).await
    }

    async fn user_saved(&self, event: LifecycleEvent, user: &User) -> Result<MaterializeReport> {
        self.setup_objects_eligible_for_user(event, user, &self.config.users)
            .await
    }

    async fn group_saved(&self, event: LifecycleEvent, group: &Group) -> Result<MaterializeReport> {
        self.setup_objects_eligible_for_group(event, group, &self.config.groups)
            .await
    }
}
