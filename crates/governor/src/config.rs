//! Configuration for the Governor.

use serde::{Deserialize, Serialize};

use governor_core::{FormatError, ObjectRef, ObjectType, PermissionName};

use crate::error::Result;

/// Permissions materialized when an object of `object_type` is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSetup {
    pub object_type: ObjectType,
    /// Permissions granted to every eligible user.
    #[serde(default)]
    pub users: Vec<String>,
    /// Permissions granted to every eligible group.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Configuration for the Governor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Application namespaces whose role modules are loaded at startup.
    pub installed_apps: Vec<String>,
    /// Per object type setup on object creation.
    pub objects: Vec<ObjectSetup>,
    /// Permissions materialized when a user is created.
    pub users: Vec<String>,
    /// Permissions materialized when a group is created.
    pub groups: Vec<String>,
    /// Whether lifecycle materialization subtracts grants that already exist.
    /// On by default, so re-materializing an object skips what it already holds.
    pub exclude_existing_on_create: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            installed_apps: Vec::new(),
            objects: Vec::new(),
            users: Vec::new(),
            groups: Vec::new(),
            exclude_existing_on_create: true,
        }
    }
}

impl GovernorConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every configured permission reference is well formed.
    ///
    /// Object setups may use bare codenames; their namespace comes from
    /// the object type.
    pub fn validate(&self) -> std::result::Result<(), FormatError> {
        for setup in &self.objects {
            let sample = ObjectRef::new(setup.object_type.clone(), 0);
            for perm in setup.users.iter().chain(&setup.groups) {
                PermissionName::parse_with_sample(perm, Some(&sample))?;
            }
        }
        for perm in self.users.iter().chain(&self.groups) {
            perm.parse::<PermissionName>()?;
        }
        Ok(())
    }

    /// The setup for objects of `object_type`, if any.
    pub fn object_setup(&self, object_type: &ObjectType) -> Option<&ObjectSetup> {
        self.objects.iter().find(|s| &s.object_type == object_type)
    }
}
