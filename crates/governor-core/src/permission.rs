//! Permission names, resolved permission handles, and permission references.
//!
//! A permission is identified by `namespace.codename`. The same textual form
//! is used as the registry key, so roles can be registered before any
//! permission has been looked up in storage.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::types::{ObjectRef, ObjectType};

/// Separator between namespace and codename.
pub const NAMESPACE_SEPARATOR: char = '.';

/// The parsed `(namespace, codename)` pair of a permission.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName {
    namespace: String,
    codename: String,
}

impl PermissionName {
    pub fn new(namespace: impl Into<String>, codename: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            codename: codename.into(),
        }
    }

    /// Parse a reference, taking the namespace from `sample` when the
    /// reference is a bare codename.
    pub fn parse_with_sample(
        reference: &str,
        sample: Option<&ObjectRef>,
    ) -> Result<Self, FormatError> {
        if reference.contains(NAMESPACE_SEPARATOR) {
            return reference.parse();
        }
        match sample {
            Some(obj) if !reference.is_empty() => {
                Ok(Self::new(obj.object_type.namespace(), reference))
            }
            _ => Err(FormatError(reference.to_string())),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn codename(&self) -> &str {
        &self.codename
    }
}

impl FromStr for PermissionName {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(NAMESPACE_SEPARATOR) {
            Some((ns, codename))
                if !ns.is_empty()
                    && !codename.is_empty()
                    && !codename.contains(NAMESPACE_SEPARATOR) =>
            {
                Ok(Self::new(ns, codename))
            }
            _ => Err(FormatError(s.to_string())),
        }
    }
}

impl TryFrom<String> for PermissionName {
    type Error = FormatError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PermissionName> for String {
    fn from(name: PermissionName) -> Self {
        name.to_string()
    }
}

impl fmt::Debug for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionName({}.{})", self.namespace, self.codename)
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.codename)
    }
}

/// A resolved permission: its name plus the object type it is declared on.
///
/// Two permissions are equal iff their names are equal; the object type is
/// carried along for object-directed queries but is not part of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub name: PermissionName,
    pub object_type: ObjectType,
}

impl Permission {
    pub fn new(name: PermissionName, object_type: ObjectType) -> Self {
        Self { name, object_type }
    }

    pub fn namespace(&self) -> &str {
        self.name.namespace()
    }

    pub fn codename(&self) -> &str {
        self.name.codename()
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

/// Anything that can name a permission: an already resolved handle or a
/// raw string reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    Resolved(Permission),
    Raw(String),
}

impl PermissionRef {
    /// The registry key for this reference, if it has a well-formed one.
    pub fn name(&self) -> Option<PermissionName> {
        match self {
            PermissionRef::Resolved(p) => Some(p.name.clone()),
            PermissionRef::Raw(raw) => raw.parse().ok(),
        }
    }
}

impl From<Permission> for PermissionRef {
    fn from(p: Permission) -> Self {
        PermissionRef::Resolved(p)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(p: &Permission) -> Self {
        PermissionRef::Resolved(p.clone())
    }
}

impl From<&str> for PermissionRef {
    fn from(s: &str) -> Self {
        PermissionRef::Raw(s.to_string())
    }
}

impl From<String> for PermissionRef {
    fn from(s: String) -> Self {
        PermissionRef::Raw(s)
    }
}

impl From<&String> for PermissionRef {
    fn from(s: &String) -> Self {
        PermissionRef::Raw(s.clone())
    }
}

impl From<PermissionName> for PermissionRef {
    fn from(name: PermissionName) -> Self {
        PermissionRef::Raw(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn document() -> ObjectType {
        ObjectType::new("docs", "document")
    }

    #[test]
    fn test_parse_name() {
        let name: PermissionName = "docs.review".parse().unwrap();
        assert_eq!(name.namespace(), "docs");
        assert_eq!(name.codename(), "review");
        assert_eq!(name.to_string(), "docs.review");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        let err = "badformat".parse::<PermissionName>().unwrap_err();
        assert_eq!(err, FormatError("badformat".into()));
        assert!("docs.".parse::<PermissionName>().is_err());
        assert!("a.b.c".parse::<PermissionName>().is_err());
    }

    #[test]
    fn test_parse_with_sample_infers_namespace() {
        let sample = ObjectRef::new(document(), 1);
        let name = PermissionName::parse_with_sample("review", Some(&sample)).unwrap();
        assert_eq!(name, PermissionName::new("docs", "review"));

        // An explicit namespace wins over the sample.
        let name = PermissionName::parse_with_sample("wiki.review", Some(&sample)).unwrap();
        assert_eq!(name.namespace(), "wiki");
    }

    #[test]
    fn test_parse_with_sample_requires_sample() {
        assert!(PermissionName::parse_with_sample("review", None).is_err());
    }

    #[test]
    fn test_permission_equality_ignores_object_type() {
        let a = Permission::new(PermissionName::new("docs", "review"), document());
        let b = Permission::new(
            PermissionName::new("docs", "review"),
            ObjectType::new("docs", "draft"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_permission_ref_name() {
        let raw = PermissionRef::from("docs.review");
        assert_eq!(raw.name(), Some(PermissionName::new("docs", "review")));
        assert_eq!(PermissionRef::from("nope").name(), None);
    }

    proptest! {
        #[test]
        fn well_formed_names_parse_back(ns in "[a-z_]{1,12}", code in "[a-z_]{1,16}") {
            let text = format!("{}.{}", ns, code);
            let name: PermissionName = text.parse().unwrap();
            prop_assert_eq!(name.namespace(), ns.as_str());
            prop_assert_eq!(name.codename(), code.as_str());
            prop_assert_eq!(name.to_string(), text);
        }

        #[test]
        fn names_without_separator_are_rejected(raw in "[a-z_]{0,20}") {
            prop_assert!(raw.parse::<PermissionName>().is_err());
        }
    }
}
