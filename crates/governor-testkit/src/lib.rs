//! # Governor Testkit
//!
//! Testing utilities for Governor.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Domain**: A documents model with authors, reviewers and teams
//! - **Roles**: `ReviewerRole` and `ReviewersGroupRole` over that model
//! - **Fixtures**: A governor wired to the domain, over either store
//! - **Generators**: Proptest strategies for random documents
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use governor_testkit::fixtures::{DocsFixture, ALICE, BOB};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let fixture = DocsFixture::memory().await?;
//!     fixture.seed_people().await?;
//!     let report = fixture.create_document(1, ALICE, Some(BOB)).await?;
//!     assert_eq!(report.user_grants, 3);
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod fixtures;
pub mod generators;
pub mod roles;

pub use domain::{DocsDomain, Document, TeamId};
pub use fixtures::DocsFixture;
pub use roles::{ReviewerRole, ReviewersGroupRole};
