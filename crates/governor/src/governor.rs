//! The Governor: unified API over storage, roles and materialization.
//!
//! Saves go through the store first so identity is durably assigned, then
//! the resulting [`LifecycleEvent`] is handed to the materializer.

use std::sync::Arc;

use governor_core::{
    Group, GroupId, LifecycleEvent, ObjectRef, Permission, PermissionRef, Registry, RoleModule,
    User, UserId,
};
use governor_store::Store;

use crate::config::GovernorConfig;
use crate::error::Result;
use crate::materializer::{LifecycleListener, MaterializeReport, Materializer};
use crate::resolver::Resolver;

/// The main Governor struct.
///
/// Provides a unified API for:
/// - Defining permissions
/// - Saving and restoring users, groups and objects
/// - Querying eligibility
/// - Checking granted permissions
pub struct Governor<S: ?Sized, D: ?Sized> {
    resolver: Resolver<S, D>,
    materializer: Materializer<S, D>,
}

impl<S, D> Governor<S, D>
where
    S: Store + ?Sized + 'static,
    D: Send + Sync + ?Sized + 'static,
{
    /// Create a governor from an already built registry.
    pub fn new(
        store: Arc<S>,
        registry: Arc<Registry<D>>,
        domain: Arc<D>,
        config: GovernorConfig,
    ) -> Self {
        let resolver = Resolver::new(store, registry, domain);
        let materializer = Materializer::new(resolver.clone(), Arc::new(config));
        Self {
            resolver,
            materializer,
        }
    }

    /// Validate `config`, load the role modules of its installed apps and
    /// build a governor around the resulting registry.
    pub fn bootstrap(
        store: Arc<S>,
        domain: Arc<D>,
        config: GovernorConfig,
        modules: &[RoleModule<D>],
    ) -> Result<Self> {
        config.validate()?;

        let mut registry = Registry::new();
        let loaded = registry.autodiscover(&config.installed_apps, modules)?;
        tracing::debug!(
            modules = loaded,
            permissions = registry.permissions().count(),
            "registry built"
        );

        Ok(Self::new(store, Arc::new(registry), domain, config))
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    pub fn registry(&self) -> &Registry<D> {
        self.resolver.registry()
    }

    pub fn domain(&self) -> &D {
        self.resolver.domain()
    }

    pub fn config(&self) -> &GovernorConfig {
        self.materializer.config()
    }

    pub fn resolver(&self) -> &Resolver<S, D> {
        &self.resolver
    }

    pub fn materializer(&self) -> &Materializer<S, D> {
        &self.materializer
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Define (or redefine) a permission.
    pub async fn define_permission(&self, permission: &Permission) -> Result<()> {
        Ok(self.store().insert_permission(permission).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Save an object. A first save materializes the grants configured for
    /// its type.
    pub async fn save_object(&self, object: &ObjectRef) -> Result<MaterializeReport> {
        let event = self.store().save_object(object).await?.into();
        self.materializer.object_saved(event, object).await
    }

    /// Load an object from a fixture or backup without materializing.
    pub async fn restore_object(&self, object: &ObjectRef) -> Result<MaterializeReport> {
        self.store().save_object(object).await?;
        self.materializer
            .object_saved(LifecycleEvent::Restored, object)
            .await
    }

    pub async fn save_user(&self, user: &User) -> Result<MaterializeReport> {
        let event = self.store().save_user(user).await?.into();
        self.materializer.user_saved(event, user).await
    }

    pub async fn restore_user(&self, user: &User) -> Result<MaterializeReport> {
        self.store().save_user(user).await?;
        self.materializer
            .user_saved(LifecycleEvent::Restored, user)
            .await
    }

    pub async fn save_group(&self, group: &Group) -> Result<MaterializeReport> {
        let event = self.store().save_group(group).await?.into();
        self.materializer.group_saved(event, group).await
    }

    pub async fn restore_group(&self, group: &Group) -> Result<MaterializeReport> {
        self.store().save_group(group).await?;
        self.materializer
            .group_saved(LifecycleEvent::Restored, group)
            .await
    }

    pub async fn add_group_member(&self, group: GroupId, user: UserId) -> Result<()> {
        Ok(self.store().add_group_member(group, user).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Users eligible for `permission` on `object` that do not hold it yet.
    pub async fn users_eligible_for_object(
        &self,
        permission: impl Into<PermissionRef>,
        object: &ObjectRef,
    ) -> Result<Vec<User>> {
        self.resolver
            .users_eligible_for_object(permission, object, true)
            .await
    }

    /// Groups eligible for `permission` on `object` that do not hold it yet.
    pub async fn groups_eligible_for_object(
        &self,
        permission: impl Into<PermissionRef>,
        object: &ObjectRef,
    ) -> Result<Vec<Group>> {
        self.resolver
            .groups_eligible_for_object(permission, object, true)
            .await
    }

    /// Whether `user` holds `permission` on `object`, directly or through a
    /// group. A bare codename takes its namespace from `object`.
    pub async fn has_permission(
        &self,
        user: UserId,
        permission: impl Into<PermissionRef>,
        object: &ObjectRef,
    ) -> Result<bool> {
        let permission = self
            .resolver
            .resolve_permission(permission, Some(object))
            .await?;
        Ok(self
            .store()
            .user_has_permission(user, &permission.name, object)
            .await?)
    }
}
