//! Strong type definitions for principals and protected objects.
//!
//! All identifiers are newtypes so a user id can never be passed where a
//! group or object id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw integer value.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Primary key of a user.
    UserId
);
id_type!(
    /// Primary key of a group.
    GroupId
);
id_type!(
    /// Primary key of a protected object, unique within its object type.
    ObjectId
);

/// A user principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// A group principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The declared type of a protected object, written `namespace.model`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectType {
    namespace: String,
    model: String,
}

impl ObjectType {
    pub fn new(namespace: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            model: model.into(),
        }
    }

    /// The namespace (application label) the type belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl FromStr for ObjectType {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((ns, model)) if !ns.is_empty() && !model.is_empty() && !model.contains('.') => {
                Ok(Self::new(ns, model))
            }
            _ => Err(FormatError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ObjectType {
    type Error = FormatError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectType> for String {
    fn from(t: ObjectType) -> Self {
        t.to_string()
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectType({}.{})", self.namespace, self.model)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.model)
    }
}

/// A reference to a protected object: its declared type plus its identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub id: ObjectId,
}

impl ObjectRef {
    pub fn new(object_type: ObjectType, id: impl Into<ObjectId>) -> Self {
        Self {
            object_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object_type, self.id)
    }
}
