//! Proptest strategies for documents scenarios.

use proptest::prelude::*;

use crate::domain::{Document, TeamId};
use governor_core::UserId;

/// Parameters for a randomly generated document.
#[derive(Debug, Clone)]
pub struct DocumentParams {
    pub author: i64,
    pub reviewer: Option<i64>,
    pub team: i64,
}

impl DocumentParams {
    pub fn document(&self) -> Document {
        Document {
            author: UserId(self.author),
            reviewer: self.reviewer.map(UserId),
            team: TeamId(self.team),
        }
    }
}

/// A document whose people are drawn from users `1..=users`.
pub fn document_params(users: i64) -> impl Strategy<Value = DocumentParams> {
    (1..=users, proptest::option::of(1..=users), 1..=3i64).prop_map(
        |(author, reviewer, team)| DocumentParams {
            author,
            reviewer,
            team,
        },
    )
}

/// Sets of team reviewers, one per team `1..=3`.
pub fn team_reviewers(users: i64) -> impl Strategy<Value = Vec<Vec<i64>>> {
    proptest::collection::vec(proptest::collection::vec(1..=users, 0..4), 3)
}
