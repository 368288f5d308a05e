//! Error types for Governor Core.

use thiserror::Error;

/// A permission reference that is not of the form `namespace.codename`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("permission format must be \"namespace.codename\": {0:?}")]
pub struct FormatError(pub String);

/// Core errors that can occur while building or querying the role registry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("cannot register role {role}: {source}")]
    Registration {
        role: &'static str,
        #[source]
        source: FormatError,
    },
}

impl CoreError {
    /// True if the underlying cause is a malformed permission reference.
    pub fn is_format_error(&self) -> bool {
        matches!(self, CoreError::Format(_) | CoreError::Registration { .. })
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
