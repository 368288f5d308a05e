//! Error types for Governor.

use governor_core::{CoreError, Direction, FormatError, PermissionName};
use governor_store::StoreError;
use thiserror::Error;

/// Errors that can occur while resolving eligibility or materializing grants.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// Malformed permission reference or invalid role registration.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage error; a failed grant batch has been rolled back.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A well-formed permission reference that matches no stored permission.
    #[error("permission not found: {0}")]
    PermissionNotFound(PermissionName),

    /// A role failed while computing eligibility.
    #[error("role {role} failed in {direction} for {permission}: {source}")]
    Role {
        role: &'static str,
        direction: Direction,
        permission: PermissionName,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GovernorError {
    /// True for malformed permission references.
    pub fn is_format_error(&self) -> bool {
        matches!(self, GovernorError::Core(e) if e.is_format_error())
    }

    /// True when a permission reference did not resolve.
    pub fn is_lookup_error(&self) -> bool {
        matches!(self, GovernorError::PermissionNotFound(_))
    }
}

impl From<FormatError> for GovernorError {
    fn from(e: FormatError) -> Self {
        GovernorError::Core(CoreError::Format(e))
    }
}

impl From<serde_json::Error> for GovernorError {
    fn from(e: serde_json::Error) -> Self {
        GovernorError::Config(e.to_string())
    }
}

/// Result type for Governor operations.
pub type Result<T> = std::result::Result<T, GovernorError>;
