//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Permissions: (namespace, codename) declared on one object type
        CREATE TABLE permissions (
            namespace TEXT NOT NULL,
            codename TEXT NOT NULL,
            object_namespace TEXT NOT NULL,
            object_model TEXT NOT NULL,
            PRIMARY KEY (namespace, codename)
        );

        CREATE TABLE principal_users (
            user_id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE
        );

        CREATE TABLE principal_groups (
            group_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE group_members (
            group_id INTEGER NOT NULL REFERENCES principal_groups(group_id),
            user_id INTEGER NOT NULL REFERENCES principal_users(user_id),
            PRIMARY KEY (group_id, user_id)
        );

        -- Identity index of protected objects
        CREATE TABLE objects (
            object_namespace TEXT NOT NULL,
            object_model TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            PRIMARY KEY (object_namespace, object_model, object_id)
        );

        CREATE TABLE user_grants (
            user_id INTEGER NOT NULL REFERENCES principal_users(user_id),
            namespace TEXT NOT NULL,
            codename TEXT NOT NULL,
            object_namespace TEXT NOT NULL,
            object_model TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            FOREIGN KEY (namespace, codename) REFERENCES permissions(namespace, codename),
            FOREIGN KEY (object_namespace, object_model, object_id)
                REFERENCES objects(object_namespace, object_model, object_id),
            UNIQUE (user_id, namespace, codename, object_namespace, object_model, object_id)
        );

        CREATE TABLE group_grants (
            group_id INTEGER NOT NULL REFERENCES principal_groups(group_id),
            namespace TEXT NOT NULL,
            codename TEXT NOT NULL,
            object_namespace TEXT NOT NULL,
            object_model TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            FOREIGN KEY (namespace, codename) REFERENCES permissions(namespace, codename),
            FOREIGN KEY (object_namespace, object_model, object_id)
                REFERENCES objects(object_namespace, object_model, object_id),
            UNIQUE (group_id, namespace, codename, object_namespace, object_model, object_id)
        );

        -- Indexes for the exclusion queries
        CREATE INDEX idx_user_grants_object
            ON user_grants(namespace, codename, object_namespace, object_model, object_id);
        CREATE INDEX idx_group_grants_object
            ON group_grants(namespace, codename, object_namespace, object_model, object_id);
        CREATE INDEX idx_group_members_user ON group_members(user_id);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
