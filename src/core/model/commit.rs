//! core::model::commit
//!
//! Immutable commit records.
//!
//! A commit's [`ContentHash`] is derived from its parent's hash and its
//! snapshot bytes only. Message, author and timestamp are descriptive and do
//! not take part in the hash, which is what makes creation idempotent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::{Author, BranchId, CommitId, ContentHash, RepositoryId, UtcTimestamp};

/// A commit in a repository's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub repository_id: RepositoryId,
    /// The branch the commit was created on.
    pub branch_id: BranchId,
    /// Absent only for a root commit.
    pub parent: Option<CommitId>,
    pub hash: ContentHash,
    pub short_hash: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: Author,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    pub created_at: UtcTimestamp,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    /// Whether the commit was written by the engine itself (e.g. a merge).
    pub fn is_system(&self) -> bool {
        self.author.is_system()
    }
}
