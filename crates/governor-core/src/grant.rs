//! Grant records and grant batches.
//!
//! A grant is the persisted fact that a principal holds a permission on an
//! object. Grants are created, never mutated; uniqueness of
//! (principal, permission, object) is enforced by storage.

use serde::{Deserialize, Serialize};

use crate::permission::Permission;
use crate::types::{GroupId, ObjectRef, UserId};

/// A permission held by a user on an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserGrant {
    pub user: UserId,
    pub permission: Permission,
    pub object: ObjectRef,
}

/// A permission held by a group on an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupGrant {
    pub group: GroupId,
    pub permission: Permission,
    pub object: ObjectRef,
}

/// Grants to be inserted together in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantBatch {
    pub users: Vec<UserGrant>,
    pub groups: Vec<GroupGrant>,
}

impl GrantBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }

    /// Append all grants of `other`.
    pub fn extend(&mut self, other: GrantBatch) {
        self.users.extend(other.users);
        self.groups.extend(other.groups);
    }
}

/// Number of grant records of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantCounts {
    pub users: usize,
    pub groups: usize,
}
