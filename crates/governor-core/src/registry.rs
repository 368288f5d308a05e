//! The role registry.
//!
//! Maps permission names to the ordered list of role instances registered
//! for them, and role types to the permissions they were registered for.
//!
//! The registry is an explicit value: build it mutably at startup (directly
//! or through [`Registry::autodiscover`]), then freeze it behind an `Arc`
//! and hand it to whatever evaluates roles. Reads need no locking because
//! nothing mutates it after startup.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::permission::{PermissionName, PermissionRef};
use crate::role::Role;

/// A registration entry point contributed by one application namespace.
pub struct RoleModule<D: ?Sized> {
    /// The application namespace this module belongs to.
    pub namespace: &'static str,
    /// Registers the module's roles.
    pub register: fn(&mut Registry<D>) -> Result<()>,
}

impl<D: ?Sized> Clone for RoleModule<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: ?Sized> Copy for RoleModule<D> {}

impl<D: ?Sized> fmt::Debug for RoleModule<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleModule")
            .field("namespace", &self.namespace)
            .finish()
    }
}

struct RolePermissions {
    name: &'static str,
    permissions: Vec<PermissionName>,
}

/// Table of roles by permission and permissions by role type.
pub struct Registry<D: ?Sized> {
    /// Roles by permission, in registration order.
    perm_roles: HashMap<PermissionName, Vec<Arc<dyn Role<D>>>>,

    /// Permissions by role type, to keep (role, permission) pairs unique.
    role_perms: HashMap<TypeId, RolePermissions>,
}

impl<D: ?Sized> Registry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            perm_roles: HashMap::new(),
            role_perms: HashMap::new(),
        }
    }

    /// Register role type `R` for each of `permissions`.
    ///
    /// Every identifier is validated before anything is recorded, so a
    /// malformed one leaves the registry untouched. Pairs that are already
    /// registered are skipped. One instance of `R` is shared by all
    /// permissions newly registered by this call.
    pub fn register<R>(&mut self, permissions: &[&str]) -> Result<()>
    where
        R: Role<D> + Default,
    {
        let role_name = std::any::type_name::<R>();

        let mut parsed = Vec::with_capacity(permissions.len());
        for raw in permissions {
            let name = raw
                .parse::<PermissionName>()
                .map_err(|source| CoreError::Registration {
                    role: role_name,
                    source,
                })?;
            parsed.push(name);
        }

        let entry = self
            .role_perms
            .entry(TypeId::of::<R>())
            .or_insert_with(|| RolePermissions {
                name: role_name,
                permissions: Vec::new(),
            });

        let mut instance: Option<Arc<dyn Role<D>>> = None;
        for name in parsed {
            if entry.permissions.contains(&name) {
                tracing::debug!(role = role_name, permission = %name, "role already registered");
                continue;
            }
            let role = instance
                .get_or_insert_with(|| Arc::new(R::default()) as Arc<dyn Role<D>>)
                .clone();

            tracing::debug!(role = role_name, permission = %name, "registered role");
            self.perm_roles.entry(name.clone()).or_default().push(role);
            entry.permissions.push(name);
        }

        Ok(())
    }

    /// Roles registered for `permission`, in registration order.
    ///
    /// Unknown permissions and malformed raw identifiers yield an empty
    /// slice.
    pub fn roles_for_permission(
        &self,
        permission: impl Into<PermissionRef>,
    ) -> &[Arc<dyn Role<D>>] {
        permission
            .into()
            .name()
            .and_then(|name| self.perm_roles.get(&name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Permissions role type `R` is registered for.
    pub fn permissions_for_role<R: Role<D>>(&self) -> &[PermissionName] {
        self.role_perms
            .get(&TypeId::of::<R>())
            .map(|r| r.permissions.as_slice())
            .unwrap_or(&[])
    }

    /// All permissions with at least one registered role.
    pub fn permissions(&self) -> impl Iterator<Item = &PermissionName> {
        self.perm_roles.keys()
    }

    /// Names of every registered role type.
    pub fn role_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.role_perms.values().map(|r| r.name)
    }

    /// True if no role has been registered.
    pub fn is_empty(&self) -> bool {
        self.perm_roles.is_empty()
    }

    /// Run the registration function of every module whose namespace is
    /// listed in `installed_apps`.
    ///
    /// Installed namespaces without a module are skipped. Returns the number
    /// of modules that ran.
    pub fn autodiscover<A: AsRef<str>>(
        &mut self,
        installed_apps: &[A],
        modules: &[RoleModule<D>],
    ) -> Result<usize> {
        let mut loaded = 0;
        for app in installed_apps {
            let app = app.as_ref();
            let mut found = false;
            for module in modules.iter().filter(|m| m.namespace == app) {
                (module.register)(self)?;
                found = true;
                loaded += 1;
            }
            if !found {
                tracing::warn!(namespace = app, "no role module for namespace");
            }
        }
        Ok(loaded)
    }
}

impl<D: ?Sized> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ?Sized + 'static> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (perm, roles) in &self.perm_roles {
            let names: Vec<_> = roles.iter().map(|r| r.name()).collect();
            map.entry(&perm.to_string(), &names);
        }
        map.finish()
    }
}
