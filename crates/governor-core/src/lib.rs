//! # Governor Core
//!
//! Pure primitives for Governor: permissions, principals, protected objects,
//! the [`Role`] capability interface and the [`Registry`] that maps
//! permissions to roles.
//!
//! This crate contains no I/O and no storage. Evaluation against storage
//! lives in the `governor` crate.
//!
//! ## Key Types
//!
//! - [`Permission`] - A resolved `namespace.codename` handle
//! - [`Role`] - Computes eligibility in both directions for a domain model
//! - [`Registry`] - Permission to role table, built once at startup
//! - [`UserGrant`] / [`GroupGrant`] - Persisted permission grants
//! - [`LifecycleEvent`] - Why an entity was saved
//!
//! ## Usage
//!
//! ```rust
//! use governor_core::{ObjectRef, Permission, Registry, Role, RoleResult, UserId};
//!
//! struct Library;
//!
//! #[derive(Default)]
//! struct LibrarianRole;
//!
//! impl Role<Library> for LibrarianRole {
//!     fn users_eligible_for_object(
//!         &self,
//!         _domain: &Library,
//!         _object: &ObjectRef,
//!         _permission: &Permission,
//!     ) -> RoleResult<Vec<UserId>> {
//!         Ok(vec![UserId(1)])
//!     }
//! }
//!
//! let mut registry = Registry::<Library>::new();
//! registry.register::<LibrarianRole>(&["books.lend"]).unwrap();
//! assert_eq!(registry.roles_for_permission("books.lend").len(), 1);
//! ```

pub mod error;
pub mod grant;
pub mod lifecycle;
pub mod permission;
pub mod registry;
pub mod role;
pub mod types;

pub use error::{CoreError, FormatError, Result};
pub use grant::{GrantBatch, GrantCounts, GroupGrant, UserGrant};
pub use lifecycle::LifecycleEvent;
pub use permission::{Permission, PermissionName, PermissionRef, NAMESPACE_SEPARATOR};
pub use registry::{Registry, RoleModule};
pub use role::{Direction, Role, RoleError, RoleResult};
pub use types::{Group, GroupId, ObjectId, ObjectRef, ObjectType, User, UserId};
