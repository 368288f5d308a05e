//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use governor_core::{
    GrantBatch, GrantCounts, Group, GroupId, ObjectId, ObjectRef, ObjectType, Permission,
    PermissionName, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{SaveResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Worker(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Worker(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Ids bound per `IN (...)` query. SQLite caps bind variables per statement.
const MAX_BIND_IDS: usize = 500;

/// `?, ?, ...` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn object_type_of(
    row: &rusqlite::Row<'_>,
    ns: usize,
    model: usize,
) -> rusqlite::Result<ObjectType> {
    Ok(ObjectType::new(
        row.get::<_, String>(ns)?,
        row.get::<_, String>(model)?,
    ))
}

fn id_set<T: Ord>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    wrap: fn(i64) -> T,
) -> Result<BTreeSet<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params, |row| row.get::<_, i64>(0))?
        .map(|r| r.map(wrap))
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(ids)
}

/// Insert or update a keyed row, reporting which one happened.
fn upsert(
    conn: &mut Connection,
    exists_sql: &str,
    insert_sql: &str,
    update_sql: &str,
    id: i64,
    value: &str,
) -> Result<SaveResult> {
    let tx = conn.transaction()?;
    let exists: bool = tx.query_row(exists_sql, params![id], |row| row.get(0))?;
    let result = if exists {
        tx.execute(update_sql, params![id, value])
            .map_err(StoreError::from_sqlite)?;
        SaveResult::Updated
    } else {
        tx.execute(insert_sql, params![id, value])
            .map_err(StoreError::from_sqlite)?;
        SaveResult::Created
    };
    tx.commit()?;
    Ok(result)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let permission = permission.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO permissions (namespace, codename, object_namespace, object_model)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, codename) DO UPDATE SET
                    object_namespace = excluded.object_namespace,
                    object_model = excluded.object_model",
                params![
                    permission.namespace(),
                    permission.codename(),
                    permission.object_type.namespace(),
                    permission.object_type.model(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_permission(&self, name: &PermissionName) -> Result<Option<Permission>> {
        let name = name.clone();
        self.run(move |conn| {
            conn.query_row(
                "SELECT object_namespace, object_model FROM permissions
                 WHERE namespace = ?1 AND codename = ?2",
                params![name.namespace(), name.codename()],
                |row| object_type_of(row, 0, 1),
            )
            .optional()
            .map(|found| found.map(|object_type| Permission::new(name.clone(), object_type)))
            .map_err(StoreError::from)
        })
        .await
    }

    async fn save_user(&self, user: &User) -> Result<SaveResult> {
        let user = user.clone();
        self.run(move |conn| {
            upsert(
                conn,
                "SELECT EXISTS(SELECT 1 FROM principal_users WHERE user_id = ?1)",
                "INSERT INTO principal_users (user_id, username) VALUES (?1, ?2)",
                "UPDATE principal_users SET username = ?2 WHERE user_id = ?1",
                user.id.get(),
                &user.username,
            )
        })
        .await
    }

    async fn save_group(&self, group: &Group) -> Result<SaveResult> {
        let group = group.clone();
        self.run(move |conn| {
            upsert(
                conn,
                "SELECT EXISTS(SELECT 1 FROM principal_groups WHERE group_id = ?1)",
                "INSERT INTO principal_groups (group_id, name) VALUES (?1, ?2)",
                "UPDATE principal_groups SET name = ?2 WHERE group_id = ?1",
                group.id.get(),
                &group.name,
            )
        })
        .await
    }

    async fn save_object(&self, object: &ObjectRef) -> Result<SaveResult> {
        let object = object.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO objects (object_namespace, object_model, object_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    object.object_type.namespace(),
                    object.object_type.model(),
                    object.id.get(),
                ],
            )?;
            Ok(if inserted == 1 {
                SaveResult::Created
            } else {
                SaveResult::Updated
            })
        })
        .await
    }

    async fn add_group_member(&self, group: GroupId, user: UserId) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                params![group.get(), user.get()],
            )
            .map_err(StoreError::from_sqlite)?;
            Ok(())
        })
        .await
    }

    async fn users_by_ids(&self, ids: &BTreeSet<UserId>) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.run(move |conn| {
            let mut users = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(MAX_BIND_IDS) {
                let sql = format!(
                    "SELECT user_id, username FROM principal_users
                     WHERE user_id IN ({}) ORDER BY user_id",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(User::new(row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?;
                for user in rows {
                    users.push(user?);
                }
            }
            Ok(users)
        })
        .await
    }

    async fn groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> Result<Vec<Group>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.run(move |conn| {
            let mut groups = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(MAX_BIND_IDS) {
                let sql = format!(
                    "SELECT group_id, name FROM principal_groups
                     WHERE group_id IN ({}) ORDER BY group_id",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(Group::new(row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?;
                for group in rows {
                    groups.push(group?);
                }
            }
            Ok(groups)
        })
        .await
    }

    async fn objects_by_ids(
        &self,
        object_type: &ObjectType,
        ids: &BTreeSet<ObjectId>,
    ) -> Result<Vec<ObjectRef>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let object_type = object_type.clone();
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();

        self.run(move |conn| {
            let mut objects = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(MAX_BIND_IDS) {
                let sql = format!(
                    "SELECT object_id FROM objects
                     WHERE object_namespace = ? AND object_model = ? AND object_id IN ({})
                     ORDER BY object_id",
                    placeholders(chunk.len())
                );
                let mut values = vec![
                    Value::Text(object_type.namespace().to_string()),
                    Value::Text(object_type.model().to_string()),
                ];
                values.extend(chunk.iter().map(|id| Value::Integer(*id)));

                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                    row.get::<_, i64>(0)
                })?;
                for id in rows {
                    objects.push(ObjectRef::new(object_type.clone(), id?));
                }
            }
            Ok(objects)
        })
        .await
    }

    async fn users_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<UserId>> {
        let (permission, object) = (permission.clone(), object.clone());
        self.run(move |conn| {
            id_set(
                conn,
                "SELECT user_id FROM user_grants
                 WHERE namespace = ?1 AND codename = ?2
                   AND object_namespace = ?3 AND object_model = ?4 AND object_id = ?5",
                params![
                    permission.namespace(),
                    permission.codename(),
                    object.object_type.namespace(),
                    object.object_type.model(),
                    object.id.get(),
                ],
                UserId,
            )
        })
        .await
    }

    async fn groups_granted_on_object(
        &self,
        permission: &Permission,
        object: &ObjectRef,
    ) -> Result<BTreeSet<GroupId>> {
        let (permission, object) = (permission.clone(), object.clone());
        self.run(move |conn| {
            id_set(
                conn,
                "SELECT group_id FROM group_grants
                 WHERE namespace = ?1 AND codename = ?2
                   AND object_namespace = ?3 AND object_model = ?4 AND object_id = ?5",
                params![
                    permission.namespace(),
                    permission.codename(),
                    object.object_type.namespace(),
                    object.object_type.model(),
                    object.id.get(),
                ],
                GroupId,
            )
        })
        .await
    }

    async fn objects_granted_to_user(
        &self,
        permission: &Permission,
        user: UserId,
    ) -> Result<BTreeSet<ObjectId>> {
        let permission = permission.clone();
        self.run(move |conn| {
            id_set(
                conn,
                "SELECT object_id FROM user_grants
                 WHERE user_id = ?1 AND namespace = ?2 AND codename = ?3
                   AND object_namespace = ?4 AND object_model = ?5",
                params![
                    user.get(),
                    permission.namespace(),
                    permission.codename(),
                    permission.object_type.namespace(),
                    permission.object_type.model(),
                ],
                ObjectId,
            )
        })
        .await
    }

    async fn objects_granted_to_group(
        &self,
        permission: &Permission,
        group: GroupId,
    ) -> Result<BTreeSet<ObjectId>> {
        let permission = permission.clone();
        self.run(move |conn| {
            id_set(
                conn,
                "SELECT object_id FROM group_grants
                 WHERE group_id = ?1 AND namespace = ?2 AND codename = ?3
                   AND object_namespace = ?4 AND object_model = ?5",
                params![
                    group.get(),
                    permission.namespace(),
                    permission.codename(),
                    permission.object_type.namespace(),
                    permission.object_type.model(),
                ],
                ObjectId,
            )
        })
        .await
    }

    async fn insert_grants(&self, batch: &GrantBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let batch = batch.clone();
        self.run(move |conn| {
            // Dropping the transaction without commit rolls it back.
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO user_grants (
                        user_id, namespace, codename, object_namespace, object_model, object_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for g in &batch.users {
                    stmt.execute(params![
                        g.user.get(),
                        g.permission.namespace(),
                        g.permission.codename(),
                        g.object.object_type.namespace(),
                        g.object.object_type.model(),
                        g.object.id.get(),
                    ])
                    .map_err(StoreError::from_sqlite)?;
                }

                let mut stmt = tx.prepare_cached(
                    "INSERT INTO group_grants (
                        group_id, namespace, codename, object_namespace, object_model, object_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for g in &batch.groups {
                    stmt.execute(params![
                        g.group.get(),
                        g.permission.namespace(),
                        g.permission.codename(),
                        g.object.object_type.namespace(),
                        g.object.object_type.model(),
                        g.object.id.get(),
                    ])
                    .map_err(StoreError::from_sqlite)?;
                }
            }
            tx.commit()?;
            Ok(batch.len())
        })
        .await
    }

    async fn user_has_permission(
        &self,
        user: UserId,
        permission: &PermissionName,
        object: &ObjectRef,
    ) -> Result<bool> {
        let (permission, object) = (permission.clone(), object.clone());
        self.run(move |conn| {
            let held: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM user_grants
                    WHERE user_id = ?1 AND namespace = ?2 AND codename = ?3
                      AND object_namespace = ?4 AND object_model = ?5 AND object_id = ?6
                 ) OR EXISTS(
                    SELECT 1 FROM group_grants g
                    JOIN group_members m ON m.group_id = g.group_id
                    WHERE m.user_id = ?1 AND g.namespace = ?2 AND g.codename = ?3
                      AND g.object_namespace = ?4 AND g.object_model = ?5 AND g.object_id = ?6
                 )",
                params![
                    user.get(),
                    permission.namespace(),
                    permission.codename(),
                    object.object_type.namespace(),
                    object.object_type.model(),
                    object.id.get(),
                ],
                |row| row.get(0),
            )?;
            Ok(held)
        })
        .await
    }

    async fn grant_counts(&self) -> Result<GrantCounts> {
        self.run(|conn| {
            let (users, groups): (i64, i64) = conn.query_row(
                "SELECT (SELECT COUNT(*) FROM user_grants), (SELECT COUNT(*) FROM group_grants)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(GrantCounts {
                users: users as usize,
                groups: groups as usize,
            })
        })
        .await
    }
}
