//! A small documents domain used to exercise roles end to end.
//!
//! Documents have an author, an optional assigned reviewer and a team. Teams
//! have reviewers of their own, and some users review everything.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use governor_core::{GroupId, ObjectId, ObjectType, UserId};

/// Object type of [`Document`] records.
pub fn document_type() -> ObjectType {
    ObjectType::new("docs", "document")
}

/// A team owning documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub author: UserId,
    pub reviewer: Option<UserId>,
    pub team: TeamId,
}

#[derive(Debug, Default)]
struct DocsState {
    documents: BTreeMap<ObjectId, Document>,
    team_reviewers: BTreeMap<TeamId, BTreeSet<UserId>>,
    global_reviewers: BTreeSet<UserId>,
    groups: BTreeMap<GroupId, String>,
    members: BTreeSet<(GroupId, UserId)>,
}

/// The documents domain model roles are evaluated against.
#[derive(Debug, Default)]
pub struct DocsDomain {
    state: RwLock<DocsState>,
}

impl DocsDomain {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> anyhow::Result<RwLockReadGuard<'_, DocsState>> {
        self.state
            .read()
            .map_err(|_| anyhow!("documents domain lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<RwLockWriteGuard<'_, DocsState>> {
        self.state
            .write()
            .map_err(|_| anyhow!("documents domain lock poisoned"))
    }

    pub fn add_document(&self, id: impl Into<ObjectId>, document: Document) -> anyhow::Result<()> {
        self.write()?.documents.insert(id.into(), document);
        Ok(())
    }

    pub fn add_team_reviewer(&self, team: TeamId, user: UserId) -> anyhow::Result<()> {
        self.write()?
            .team_reviewers
            .entry(team)
            .or_default()
            .insert(user);
        Ok(())
    }

    /// Mark `user` as a reviewer of every document.
    pub fn add_global_reviewer(&self, user: UserId) -> anyhow::Result<()> {
        self.write()?.global_reviewers.insert(user);
        Ok(())
    }

    pub fn add_group(&self, id: GroupId, name: impl Into<String>) -> anyhow::Result<()> {
        self.write()?.groups.insert(id, name.into());
        Ok(())
    }

    pub fn add_member(&self, group: GroupId, user: UserId) -> anyhow::Result<()> {
        self.write()?.members.insert((group, user));
        Ok(())
    }

    pub fn document(&self, id: ObjectId) -> anyhow::Result<Document> {
        self.read()?
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown document {}", id))
    }

    pub fn document_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        Ok(self.read()?.documents.keys().copied().collect())
    }

    /// Reviewers of every document plus the reviewers of `team`.
    pub fn reviewers_of(&self, team: TeamId) -> anyhow::Result<BTreeSet<UserId>> {
        let state = self.read()?;
        let mut reviewers = state.global_reviewers.clone();
        if let Some(team) = state.team_reviewers.get(&team) {
            reviewers.extend(team.iter().copied());
        }
        Ok(reviewers)
    }

    pub fn is_global_reviewer(&self, user: UserId) -> anyhow::Result<bool> {
        Ok(self.read()?.global_reviewers.contains(&user))
    }

    /// Groups with the given name.
    pub fn groups_named(&self, name: &str) -> anyhow::Result<Vec<GroupId>> {
        Ok(self
            .read()?
            .groups
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
            .collect())
    }

    pub fn group_name(&self, group: GroupId) -> anyhow::Result<Option<String>> {
        Ok(self.read()?.groups.get(&group).cloned())
    }

    /// Whether `user` belongs to a group called `name`.
    pub fn is_member_of(&self, user: UserId, name: &str) -> anyhow::Result<bool> {
        let state = self.read()?;
        Ok(state.members.iter().any(|(group, member)| {
            *member == user && state.groups.get(group).map(String::as_str) == Some(name)
        }))
    }
}
