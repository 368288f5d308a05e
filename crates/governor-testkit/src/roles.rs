//! Roles for the documents domain.

use governor_core::{
    Group, GroupId, ObjectId, ObjectRef, Permission, Registry, Role, RoleModule, RoleResult,
    User, UserId,
};

use crate::domain::DocsDomain;

/// Name of the group whose members review every document.
pub const REVIEWERS_GROUP: &str = "Reviewers";

/// Permissions decided by the roles in this module.
pub const REVIEW_PERMISSIONS: &[&str] = &["docs.review", "docs.preview"];

/// Users who may review a document: global reviewers, the reviewers of the
/// document's team, its assigned reviewer and its author.
#[derive(Debug, Default)]
pub struct ReviewerRole;

impl Role<DocsDomain> for ReviewerRole {
    fn users_eligible_for_object(
        &self,
        domain: &DocsDomain,
        object: &ObjectRef,
        _permission: &Permission,
    ) -> RoleResult<Vec<UserId>> {
        let document = domain.document(object.id)?;
        let mut users = domain.reviewers_of(document.team)?;
        users.extend(document.reviewer);
        users.insert(document.author);
        Ok(users.into_iter().collect())
    }

    fn objects_eligible_for_user(
        &self,
        domain: &DocsDomain,
        user: &User,
        _permission: &Permission,
    ) -> RoleResult<Vec<ObjectId>> {
        let everything = domain.is_global_reviewer(user.id)?
            || domain.is_member_of(user.id, REVIEWERS_GROUP)?;

        let mut objects = Vec::new();
        for id in domain.document_ids()? {
            if everything {
                objects.push(id);
                continue;
            }
            let document = domain.document(id)?;
            if document.author == user.id
                || document.reviewer == Some(user.id)
                || domain.reviewers_of(document.team)?.contains(&user.id)
            {
                objects.push(id);
            }
        }
        Ok(objects)
    }
}

/// The "Reviewers" group may review every document.
#[derive(Debug, Default)]
pub struct ReviewersGroupRole;

impl Role<DocsDomain> for ReviewersGroupRole {
    fn groups_eligible_for_object(
        &self,
        domain: &DocsDomain,
        _object: &ObjectRef,
        _permission: &Permission,
    ) -> RoleResult<Vec<GroupId>> {
        domain.groups_named(REVIEWERS_GROUP)
    }

    fn objects_eligible_for_group(
        &self,
        domain: &DocsDomain,
        group: &Group,
        _permission: &Permission,
    ) -> RoleResult<Vec<ObjectId>> {
        if group.name == REVIEWERS_GROUP {
            domain.document_ids()
        } else {
            Ok(Vec::new())
        }
    }
}

/// Register the documents roles.
pub fn register(registry: &mut Registry<DocsDomain>) -> governor_core::Result<()> {
    registry.register::<ReviewerRole>(REVIEW_PERMISSIONS)?;
    registry.register::<ReviewersGroupRole>(REVIEW_PERMISSIONS)?;
    Ok(())
}

/// Role modules available to [`Registry::autodiscover`].
pub fn modules() -> Vec<RoleModule<DocsDomain>> {
    vec![RoleModule {
        namespace: "docs",
        register,
    }]
}
