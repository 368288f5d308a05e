//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The blocking worker or connection lock failed.
    #[error("storage worker failed: {0}")]
    Worker(String),
}

impl StoreError {
    /// Classify a SQLite write error: foreign key failures become
    /// `NotFound`, other constraint violations become `Conflict`.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    StoreError::NotFound(detail)
                } else {
                    StoreError::Conflict(detail)
                }
            }
            other => StoreError::Database(other),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(extended_code),
            Some("constraint failed".into()),
        )
    }

    #[test]
    fn test_from_sqlite_classifies_constraints() {
        let err = StoreError::from_sqlite(failure(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE));
        assert!(matches!(err, StoreError::Conflict(ref m) if m == "constraint failed"));

        let err = StoreError::from_sqlite(failure(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY));
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = StoreError::from_sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
