//! # Governor
//!
//! Role-driven object permissions: decide who is eligible for a permission
//! on an object (or which objects a principal is eligible for), and persist
//! those decisions as grants when entities are created.
//!
//! ## Overview
//!
//! - **Roles** encode domain rules ("the author of a document may review
//!   it") against your domain model.
//! - **Registry** maps each permission to the roles that decide it. It is
//!   built once at startup and shared read-only.
//! - **Resolver** unions the answers of every registered role and resolves
//!   them through storage.
//! - **Materializer** turns eligibility into grants on creation, in one
//!   transaction.
//!
//! ## Key Concepts
//!
//! - **Permission**: `namespace.codename`, declared for one object type.
//! - **Grant**: a persisted (principal, permission, object) triple.
//! - **Lifecycle event**: only a genuine creation materializes grants;
//!   updates and restores never do.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use governor::core::{ObjectRef, ObjectType, Permission, PermissionName, Registry};
//! use governor::store::SqliteStore;
//! use governor::{Governor, GovernorConfig};
//!
//! struct Library;
//!
//! async fn example() -> governor::Result<()> {
//!     let store = Arc::new(SqliteStore::open("governor.db")?);
//!     let registry = Arc::new(Registry::<Library>::new());
//!     let config = GovernorConfig::from_json(
//!         r#"{"objects": [{"object_type": "books.book", "users": ["lend"]}]}"#,
//!     )?;
//!
//!     let governor = Governor::new(store, registry, Arc::new(Library), config);
//!
//!     let book = ObjectType::new("books", "book");
//!     governor
//!         .define_permission(&Permission::new(PermissionName::new("books", "lend"), book.clone()))
//!         .await?;
//!
//!     // First save: grants for "books.lend" are materialized.
//!     let report = governor.save_object(&ObjectRef::new(book, 1)).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `governor::core` - Permissions, roles, registry and grant types
//! - `governor::store` - Storage abstraction, SQLite and in-memory stores

pub mod config;
pub mod error;
pub mod governor;
pub mod lookup;
pub mod materializer;
pub mod resolver;

// Re-export component crates
pub use governor_core as core;
pub use governor_store as store;

// Re-export main types for convenience
pub use config::{GovernorConfig, ObjectSetup};
pub use error::{GovernorError, Result};
pub use governor::Governor;
pub use lookup::resolve_permission;
pub use materializer::{LifecycleListener, MaterializeReport, Materializer};
pub use resolver::Resolver;

// Re-export commonly used core types
pub use governor_core::{
    Direction, Group, GroupId, LifecycleEvent, ObjectId, ObjectRef, ObjectType, Permission,
    PermissionName, PermissionRef, Registry, Role, RoleModule, RoleResult, User, UserId,
};
