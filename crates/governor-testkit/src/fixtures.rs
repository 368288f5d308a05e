//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;
use std::sync::Arc;

use governor::{Governor, GovernorConfig, MaterializeReport, ObjectSetup};
use governor_core::{Group, GroupId, ObjectRef, Permission, PermissionName, User, UserId};
use governor_store::{MemoryStore, SqliteStore, Store};

use crate::domain::{document_type, DocsDomain, Document, TeamId};
use crate::roles::{self, REVIEWERS_GROUP};

/// Author of the scenario document.
pub const ALICE: UserId = UserId(1);
/// Assigned reviewer of the scenario document.
pub const BOB: UserId = UserId(2);
/// Reviews every document.
pub const CAROL: UserId = UserId(3);
/// Member of the Reviewers group.
pub const DAVE: UserId = UserId(4);
/// Not related to any document.
pub const ERIN: UserId = UserId(5);

pub const REVIEWERS: GroupId = GroupId(1);
pub const WRITERS: GroupId = GroupId(2);

pub const TEAM: TeamId = TeamId(1);

/// `docs.review`, `docs.preview` and `docs.add` (the last has no roles).
pub fn docs_permissions() -> Vec<Permission> {
    ["review", "preview", "add"]
        .into_iter()
        .map(|codename| Permission::new(PermissionName::new("docs", codename), document_type()))
        .collect()
}

/// Materialize `docs.review` for users and groups on document creation.
pub fn docs_config() -> GovernorConfig {
    GovernorConfig {
        installed_apps: vec!["auth".into(), "docs".into()],
        objects: vec![ObjectSetup {
            object_type: document_type(),
            users: vec!["review".into()],
            groups: vec!["review".into()],
        }],
        users: vec!["docs.review".into()],
        groups: vec!["docs.review".into()],
        exclude_existing_on_create: true,
    }
}

/// A governor over the documents domain with its permissions defined.
pub struct DocsFixture<S: ?Sized> {
    pub governor: Governor<S, DocsDomain>,
    pub domain: Arc<DocsDomain>,
}

impl DocsFixture<MemoryStore> {
    pub async fn memory() -> anyhow::Result<Self> {
        Self::new(Arc::new(MemoryStore::new()), docs_config()).await
    }
}

impl DocsFixture<SqliteStore> {
    pub async fn sqlite_memory() -> anyhow::Result<Self> {
        Self::new(Arc::new(SqliteStore::open_memory()?), docs_config()).await
    }

    pub async fn sqlite(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::new(Arc::new(SqliteStore::open(path)?), docs_config()).await
    }
}

impl<S> DocsFixture<S>
where
    S: Store + ?Sized + 'static,
{
    /// Bootstrap a governor from `config` and define the docs permissions.
    pub async fn new(store: Arc<S>, config: GovernorConfig) -> anyhow::Result<Self> {
        let domain = Arc::new(DocsDomain::new());
        let governor = Governor::bootstrap(store, Arc::clone(&domain), config, &roles::modules())?;
        for permission in docs_permissions() {
            governor.define_permission(&permission).await?;
        }
        Ok(Self { governor, domain })
    }

    pub fn store(&self) -> &S {
        self.governor.store()
    }

    /// Create the people of the scenario: five users, the Reviewers group
    /// (with Dave in it), a Writers group, Carol as a global reviewer.
    pub async fn seed_people(&self) -> anyhow::Result<()> {
        for (id, name) in [
            (ALICE, "alice"),
            (BOB, "bob"),
            (CAROL, "carol"),
            (DAVE, "dave"),
            (ERIN, "erin"),
        ] {
            self.governor.save_user(&User::new(id, name)).await?;
        }

        for (id, name) in [(REVIEWERS, REVIEWERS_GROUP), (WRITERS, "Writers")] {
            self.domain.add_group(id, name)?;
            self.governor.save_group(&Group::new(id, name)).await?;
        }

        self.domain.add_member(REVIEWERS, DAVE)?;
        self.governor.add_group_member(REVIEWERS, DAVE).await?;

        self.domain.add_global_reviewer(CAROL)?;
        Ok(())
    }

    /// Record a document in the domain, then save it through the governor.
    pub async fn create_document(
        &self,
        id: i64,
        author: UserId,
        reviewer: Option<UserId>,
    ) -> anyhow::Result<MaterializeReport> {
        self.domain.add_document(
            id,
            Document {
                author,
                reviewer,
                team: TEAM,
            },
        )?;
        Ok(self.governor.save_object(&document(id)).await?)
    }
}

/// Reference to document `id`.
pub fn document(id: i64) -> ObjectRef {
    ObjectRef::new(document_type(), id)
}
