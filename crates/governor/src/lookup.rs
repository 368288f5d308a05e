//! Permission lookup: turn a permission reference into a stored permission.

use governor_core::{ObjectRef, Permission, PermissionName, PermissionRef};
use governor_store::Store;

use crate::error::{GovernorError, Result};

/// Resolve `reference` to a stored [`Permission`].
///
/// - A resolved permission is returned unchanged.
/// - `namespace.codename` is looked up as-is.
/// - A bare codename takes its namespace from `sample`'s object type.
///
/// Fails with a format error when a bare codename has no sample, and with
/// [`GovernorError::PermissionNotFound`] when nothing is stored under the
/// name.
pub async fn resolve_permission<S>(
    store: &S,
    reference: impl Into<PermissionRef>,
    sample: Option<&ObjectRef>,
) -> Result<Permission>
where
    S: Store + ?Sized,
{
    let raw = match reference.into() {
        PermissionRef::Resolved(permission) => return Ok(permission),
        PermissionRef::Raw(raw) => raw,
    };

    let name = PermissionName::parse_with_sample(&raw, sample)?;
    store
        .get_permission(&name)
        .await?
        .ok_or(GovernorError::PermissionNotFound(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor_core::ObjectType;
    use governor_store::MemoryStore;

    fn review() -> Permission {
        Permission::new(
            PermissionName::new("docs", "review"),
            ObjectType::new("docs", "document"),
        )
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_permission(&review()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_resolved_is_returned_unchanged() {
        let store = MemoryStore::new();
        let perm = resolve_permission(&store, review(), None).await.unwrap();
        assert_eq!(perm, review());
    }

    #[tokio::test]
    async fn test_dotted_reference() {
        let store = store().await;
        let perm = resolve_permission(&store, "docs.review", None).await.unwrap();
        assert_eq!(perm.object_type, ObjectType::new("docs", "document"));
    }

    #[tokio::test]
    async fn test_bare_codename_needs_sample() {
        let store = store().await;
        let err = resolve_permission(&store, "review", None).await.unwrap_err();
        assert!(err.is_format_error());

        let sample = ObjectRef::new(ObjectType::new("docs", "document"), 1);
        let perm = resolve_permission(&store, "review", Some(&sample))
            .await
            .unwrap();
        assert_eq!(perm.name, PermissionName::new("docs", "review"));
    }

    #[tokio::test]
    async fn test_unknown_permission_is_lookup_error() {
        let store = store().await;
        let err = resolve_permission(&store, "docs.delete", None)
            .await
            .unwrap_err();
        assert!(err.is_lookup_error());
    }
}
