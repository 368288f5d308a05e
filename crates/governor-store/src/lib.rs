//! # Governor Store
//!
//! Storage abstraction for Governor. Provides a trait-based interface for
//! permissions, principals, protected objects and grant records, with SQLite
//! and in-memory implementations.
//!
//! ## Overview
//!
//! The resolver and materializer are storage-agnostic: they only use the
//! [`Store`] trait. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for testing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use governor_store::{SqliteStore, Store};
//! use governor_core::{ObjectType, Permission, PermissionName};
//!
//! async fn example() {
//!     let store = SqliteStore::open("governor.db").unwrap();
//!
//!     let review = Permission::new(
//!         PermissionName::new("docs", "review"),
//!         ObjectType::new("docs", "document"),
//!     );
//!     store.insert_permission(&review).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic batches**: grant batches are inserted in one transaction
//! - **Unique grants**: a duplicate (principal, permission, object) fails the batch
//! - **Identity lookups**: unknown ids are dropped, results are ordered by id

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{SaveResult, Store};
