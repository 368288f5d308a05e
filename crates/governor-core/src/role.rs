//! The Role capability interface.
//!
//! A role computes eligibility for one or more permissions in either
//! direction: which principals may hold a permission on an object, and
//! which objects a principal may be granted a permission on. Every
//! operation has a default that returns no candidates, so a role only
//! overrides the directions it understands.

use crate::permission::Permission;
use crate::types::{Group, GroupId, ObjectId, ObjectRef, User, UserId};

/// Error type returned by role operations.
pub type RoleError = anyhow::Error;

/// Result type for role operations.
pub type RoleResult<T> = std::result::Result<T, RoleError>;

/// A stateless eligibility rule evaluated against a domain model `D`.
///
/// Roles must be pure: no side effects, finite output, and only identities
/// that exist in the caller's domain. Duplicate identities are fine; the
/// resolver collapses them.
pub trait Role<D: ?Sized>: Send + Sync + 'static {
    /// Users eligible to hold `permission` on `object`.
    fn users_eligible_for_object(
        &self,
        _domain: &D,
        _object: &ObjectRef,
        _permission: &Permission,
    ) -> RoleResult<Vec<UserId>> {
        Ok(Vec::new())
    }

    /// Groups eligible to hold `permission` on `object`.
    fn groups_eligible_for_object(
        &self,
        _domain: &D,
        _object: &ObjectRef,
        _permission: &Permission,
    ) -> RoleResult<Vec<GroupId>> {
        Ok(Vec::new())
    }

    /// Objects of `permission.object_type` the user is eligible for.
    fn objects_eligible_for_user(
        &self,
        _domain: &D,
        _user: &User,
        _permission: &Permission,
    ) -> RoleResult<Vec<ObjectId>> {
        Ok(Vec::new())
    }

    /// Objects of `permission.object_type` the group is eligible for.
    fn objects_eligible_for_group(
        &self,
        _domain: &D,
        _group: &Group,
        _permission: &Permission,
    ) -> RoleResult<Vec<ObjectId>> {
        Ok(Vec::new())
    }

    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The four directions a role can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    UsersForObject,
    GroupsForObject,
    ObjectsForUser,
    ObjectsForGroup,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::UsersForObject => "users_eligible_for_object",
            Direction::GroupsForObject => "groups_eligible_for_object",
            Direction::ObjectsForUser => "objects_eligible_for_user",
            Direction::ObjectsForGroup => "objects_eligible_for_group",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionName;
    use crate::types::ObjectType;

    #[derive(Default)]
    struct Silent;

    impl Role<()> for Silent {}

    #[test]
    fn test_default_operations_are_empty() {
        let perm = Permission::new(
            PermissionName::new("docs", "review"),
            ObjectType::new("docs", "document"),
        );
        let obj = ObjectRef::new(perm.object_type.clone(), 1);
        let role = Silent;

        assert!(role.users_eligible_for_object(&(), &obj, &perm).unwrap().is_empty());
        assert!(role.groups_eligible_for_object(&(), &obj, &perm).unwrap().is_empty());
        assert!(role
            .objects_eligible_for_user(&(), &User::new(1, "a"), &perm)
            .unwrap()
            .is_empty());
        assert!(role
            .objects_eligible_for_group(&(), &Group::new(1, "g"), &perm)
            .unwrap()
            .is_empty());
        assert!(role.name().ends_with("Silent"));
    }
}
