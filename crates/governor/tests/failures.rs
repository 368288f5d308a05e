//! Failure paths: rollback, role errors, lookup errors and SQLite storage.

use std::sync::Arc;

use governor::{Direction, GovernorConfig, GovernorError, LifecycleListener};
use governor_core::{
    GrantBatch, GroupGrant, LifecycleEvent, Permission, PermissionName, User, UserGrant,
};
use governor_store::{MemoryStore, SqliteStore, Store, StoreError};
use governor_testkit::domain::document_type;
use governor_testkit::fixtures::{
    docs_config, document, DocsFixture, ALICE, BOB, REVIEWERS, TEAM,
};
use governor_testkit::Document;

/// The documents config with lifecycle exclusion turned off.
fn strict_config() -> GovernorConfig {
    GovernorConfig {
        exclude_existing_on_create: false,
        ..docs_config()
    }
}

async fn strict_memory() -> DocsFixture<MemoryStore> {
    DocsFixture::new(Arc::new(MemoryStore::new()), strict_config())
        .await
        .unwrap()
}

async fn strict_sqlite() -> DocsFixture<SqliteStore> {
    DocsFixture::new(Arc::new(SqliteStore::open_memory().unwrap()), strict_config())
        .await
        .unwrap()
}

fn review() -> Permission {
    Permission::new(PermissionName::new("docs", "review"), document_type())
}

/// Save document 1 without an event and hand `pre_grant` to storage.
async fn with_pre_granted<S: Store + ?Sized + 'static>(
    fixture: &DocsFixture<S>,
    pre_grant: GrantBatch,
) {
    fixture.seed_people().await.unwrap();
    fixture
        .domain
        .add_document(
            1,
            Document {
                author: ALICE,
                reviewer: Some(BOB),
                team: TEAM,
            },
        )
        .unwrap();
    fixture.store().save_object(&document(1)).await.unwrap();
    fixture.store().insert_grants(&pre_grant).await.unwrap();
}

fn bob_grant() -> GrantBatch {
    GrantBatch {
        users: vec![UserGrant {
            user: BOB,
            permission: review(),
            object: document(1),
        }],
        groups: Vec::new(),
    }
}

fn reviewers_grant() -> GrantBatch {
    GrantBatch {
        users: Vec::new(),
        groups: vec![GroupGrant {
            group: REVIEWERS,
            permission: review(),
            object: document(1),
        }],
    }
}

async fn assert_rolled_back<S: Store + ?Sized + 'static>(fixture: &DocsFixture<S>) {
    let materializer = fixture.governor.materializer();

    let err = materializer
        .setup_users_eligible_for_object(LifecycleEvent::Created, &document(1), ["review"])
        .await
        .unwrap_err();
    assert!(matches!(err, GovernorError::Store(StoreError::Conflict(_))));

    let counts = fixture.store().grant_counts().await.unwrap();
    assert_eq!((counts.users, counts.groups), (1, 0));
    assert!(!fixture
        .governor
        .has_permission(ALICE, "review", &document(1))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_conflict_rolls_back_memory() {
    let fixture = strict_memory().await;
    with_pre_granted(&fixture, bob_grant()).await;
    assert_rolled_back(&fixture).await;
}

#[tokio::test]
async fn test_conflict_rolls_back_sqlite() {
    let fixture = strict_sqlite().await;
    with_pre_granted(&fixture, bob_grant()).await;
    assert_rolled_back(&fixture).await;
}

#[tokio::test]
async fn test_group_conflict_rolls_back_user_grants() {
    let fixture = strict_sqlite().await;
    with_pre_granted(&fixture, reviewers_grant()).await;

    // Users and groups go out in one batch, so the group conflict also
    // discards the three user grants.
    let err = fixture
        .governor
        .materializer()
        .object_saved(LifecycleEvent::Created, &document(1))
        .await
        .unwrap_err();
    assert!(matches!(err, GovernorError::Store(StoreError::Conflict(_))));

    let counts = fixture.store().grant_counts().await.unwrap();
    assert_eq!((counts.users, counts.groups), (0, 1));
}

#[tokio::test]
async fn test_existing_grants_are_skipped_by_default() {
    let fixture = DocsFixture::memory().await.unwrap();
    with_pre_granted(&fixture, reviewers_grant()).await;

    let report = fixture
        .governor
        .materializer()
        .object_saved(LifecycleEvent::Created, &document(1))
        .await
        .unwrap();
    assert_eq!((report.user_grants, report.group_grants), (3, 0));
}

#[tokio::test]
async fn test_repeated_creation_is_idempotent_sqlite() {
    let fixture = DocsFixture::sqlite_memory().await.unwrap();
    with_pre_granted(&fixture, bob_grant()).await;
    let materializer = fixture.governor.materializer();

    let report = materializer
        .object_saved(LifecycleEvent::Created, &document(1))
        .await
        .unwrap();
    assert_eq!((report.user_grants, report.group_grants), (2, 1));

    // Everything is granted now, so a replayed creation writes nothing.
    let report = materializer
        .object_saved(LifecycleEvent::Created, &document(1))
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    let counts = fixture.store().grant_counts().await.unwrap();
    assert_eq!((counts.users, counts.groups), (3, 1));
}

#[tokio::test]
async fn test_role_failure_propagates_and_persists_nothing() {
    let fixture = DocsFixture::memory().await.unwrap();
    fixture.seed_people().await.unwrap();

    // No document 9 in the domain: the reviewer role cannot answer.
    let err = fixture.governor.save_object(&document(9)).await.unwrap_err();
    match err {
        GovernorError::Role {
            role,
            direction,
            permission,
            source,
        } => {
            assert!(role.ends_with("ReviewerRole"));
            assert_eq!(direction, Direction::UsersForObject);
            assert_eq!(permission, PermissionName::new("docs", "review"));
            assert_eq!(source.to_string(), "unknown document 9");
        }
        other => panic!("unexpected error: {other}"),
    }

    let counts = fixture.store().grant_counts().await.unwrap();
    assert_eq!((counts.users, counts.groups), (0, 0));
}

#[tokio::test]
async fn test_unknown_permission_is_lookup_error() {
    let fixture = DocsFixture::memory().await.unwrap();
    fixture.seed_people().await.unwrap();

    let err = fixture
        .governor
        .users_eligible_for_object("docs.publish", &document(1))
        .await
        .unwrap_err();
    assert!(err.is_lookup_error());

    let err = fixture
        .governor
        .resolver()
        .objects_eligible_for_user("review", &User::new(ALICE, "alice"), true)
        .await
        .unwrap_err();
    assert!(err.is_format_error());
}

#[tokio::test]
async fn test_bootstrap_rejects_bad_config() {
    let config = GovernorConfig {
        users: vec!["review".into()],
        ..docs_config()
    };
    let result = DocsFixture::new(Arc::new(MemoryStore::new()), config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sqlite_file_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("governor.db");

    {
        let fixture = DocsFixture::sqlite(&path).await.unwrap();
        fixture.seed_people().await.unwrap();
        let report = fixture.create_document(1, ALICE, Some(BOB)).await.unwrap();
        assert_eq!((report.user_grants, report.group_grants), (3, 1));
    }

    // Grants survive reopening the database.
    let store = SqliteStore::open(&path).unwrap();
    let counts = store.grant_counts().await.unwrap();
    assert_eq!((counts.users, counts.groups), (3, 1));
    assert!(store
        .user_has_permission(BOB, &review().name, &document(1))
        .await
        .unwrap());
}
