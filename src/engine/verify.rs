//! engine::verify
//!
//! Read-only consistency checks for one repository.
//!
//! # Checks
//!
//! - Exactly one default branch, matching the repository record
//! - The default branch is never merged
//! - Every branch head is reachable from its base
//! - Every parent exists, lives in the same repository and is older than
//!   its child
//! - Parent links form no cycles
//! - Stored hashes match hashes recomputed from parent and snapshot
//!
//! Verification collects every issue instead of stopping at the first.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::error::EngineError;
use crate::core::model::{BranchStatus, Commit};
use crate::core::types::{BranchName, CommitId, ContentHash, RepositoryId};
use crate::store::{Store, StoreError};

/// A single violated invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum VerifyIssue {
    DefaultBranchCount { count: usize },
    DefaultBranchMismatch { name: BranchName },
    DefaultBranchMerged { name: BranchName },
    HeadWithoutBase { branch: BranchName },
    HeadNotReachable { branch: BranchName, head: CommitId },
    MissingParent { commit: CommitId, parent: CommitId },
    ForeignParent { commit: CommitId, parent: CommitId },
    ParentNotEarlier { commit: CommitId, parent: CommitId },
    ParentCycle { commit: CommitId },
    MissingSnapshot { commit: CommitId },
    HashMismatch { commit: CommitId, stored: ContentHash, computed: ContentHash },
    ShortHashMismatch { commit: CommitId },
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyIssue::DefaultBranchCount { count } => {
                write!(f, "expected exactly one default branch, found {count}")
            }
            VerifyIssue::DefaultBranchMismatch { name } => {
                write!(f, "repository default does not point at default branch '{name}'")
            }
            VerifyIssue::DefaultBranchMerged { name } => {
                write!(f, "default branch '{name}' is marked merged")
            }
            VerifyIssue::HeadWithoutBase { branch } => {
                write!(f, "branch '{branch}' has a head but no base")
            }
            VerifyIssue::HeadNotReachable { branch, head } => {
                write!(f, "head {head} of '{branch}' is not reachable from its base")
            }
            VerifyIssue::MissingParent { commit, parent } => {
                write!(f, "commit {commit} references missing parent {parent}")
            }
            VerifyIssue::ForeignParent { commit, parent } => {
                write!(f, "commit {commit} has parent {parent} from another repository")
            }
            VerifyIssue::ParentNotEarlier { commit, parent } => {
                write!(f, "commit {commit} is not later than its parent {parent}")
            }
            VerifyIssue::ParentCycle { commit } => {
                write!(f, "parent links loop through commit {commit}")
            }
            VerifyIssue::MissingSnapshot { commit } => {
                write!(f, "commit {commit} has no stored snapshot")
            }
            VerifyIssue::HashMismatch {
                commit,
                stored,
                computed,
            } => write!(
                f,
                "commit {commit} hash {} does not match content ({})",
                stored.short(12),
                computed.short(12)
            ),
            VerifyIssue::ShortHashMismatch { commit } => {
                write!(f, "commit {commit} short hash is not a prefix of its hash")
            }
        }
    }
}

/// Outcome of [`verify_repository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub repository: RepositoryId,
    pub branches_checked: usize,
    pub commits_checked: usize,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every invariant of one repository without mutating it.
pub fn verify_repository(
    store: &dyn Store,
    repository: RepositoryId,
) -> Result<VerifyReport, EngineError> {
    let repo = store.get_repository(repository)?;
    let branches = store.list_branches(repository)?;
    let commits: HashMap<CommitId, Commit> = store
        .list_commits(repository, None)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let mut issues = Vec::new();

    // Default branch
    let defaults: Vec<_> = branches.iter().filter(|b| b.is_default).collect();
    if defaults.len() != 1 {
        issues.push(VerifyIssue::DefaultBranchCount {
            count: defaults.len(),
        });
    }
    for branch in &defaults {
        if branch.id != repo.default_branch {
            issues.push(VerifyIssue::DefaultBranchMismatch {
                name: branch.name.clone(),
            });
        }
        if branch.status == BranchStatus::Merged {
            issues.push(VerifyIssue::DefaultBranchMerged {
                name: branch.name.clone(),
            });
        }
    }

    // Parent links
    for commit in commits.values() {
        let Some(parent_id) = commit.parent else {
            continue;
        };
        let parent = match commits.get(&parent_id) {
            Some(p) => p.clone(),
            None => match store.get_commit(parent_id) {
                Ok(p) => p,
                Err(StoreError::NotFound(_)) => {
                    issues.push(VerifyIssue::MissingParent {
                        commit: commit.id,
                        parent: parent_id,
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
        };
        if parent.repository_id != repository {
            issues.push(VerifyIssue::ForeignParent {
                commit: commit.id,
                parent: parent_id,
            });
        }
        if parent.created_at >= commit.created_at {
            issues.push(VerifyIssue::ParentNotEarlier {
                commit: commit.id,
                parent: parent_id,
            });
        }
    }

    // Cycles
    let mut cyclic = HashSet::new();
    let mut done: HashSet<CommitId> = HashSet::new();
    let mut starts: Vec<_> = commits.keys().copied().collect();
    starts.sort();
    for start in starts {
        let mut on_path = HashSet::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if done.contains(&id) {
                break;
            }
            if !on_path.insert(id) {
                if cyclic.insert(id) {
                    issues.push(VerifyIssue::ParentCycle { commit: id });
                }
                break;
            }
            cursor = commits.get(&id).and_then(|c| c.parent);
        }
        done.extend(on_path);
    }

    // Hashes
    for commit in commits.values() {
        if !commit.hash.has_prefix(&commit.short_hash) || commit.short_hash.is_empty() {
            issues.push(VerifyIssue::ShortHashMismatch { commit: commit.id });
        }
        let snapshot = match store.get_snapshot(commit.id) {
            Ok(s) => s,
            Err(StoreError::NotFound(_)) => {
                issues.push(VerifyIssue::MissingSnapshot { commit: commit.id });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let parent_hash = commit
            .parent
            .and_then(|p| commits.get(&p))
            .map(|p| &p.hash);
        if commit.parent.is_some() && parent_hash.is_none() {
            // Already reported as a missing or foreign parent.
            continue;
        }
        let computed = ContentHash::compute(parent_hash, &snapshot.canonical_bytes());
        if computed != commit.hash {
            issues.push(VerifyIssue::HashMismatch {
                commit: commit.id,
                stored: commit.hash.clone(),
                computed,
            });
        }
    }

    // Head reachability
    for branch in &branches {
        let Some(head) = branch.head else {
            continue;
        };
        let Some(base) = branch.base else {
            issues.push(VerifyIssue::HeadWithoutBase {
                branch: branch.name.clone(),
            });
            continue;
        };
        let mut seen = HashSet::new();
        let mut cursor = Some(head);
        let mut reached = false;
        while let Some(id) = cursor {
            if id == base {
                reached = true;
                break;
            }
            if !seen.insert(id) {
                break;
            }
            cursor = commits.get(&id).and_then(|c| c.parent);
        }
        if !reached {
            issues.push(VerifyIssue::HeadNotReachable {
                branch: branch.name.clone(),
                head,
            });
        }
    }

    if issues.is_empty() {
        tracing::debug!(repository = %repository, "verification passed");
    } else {
        tracing::warn!(repository = %repository, issues = issues.len(), "verification found issues");
    }

    Ok(VerifyReport {
        repository,
        branches_checked: branches.len(),
        commits_checked: commits.len(),
        issues,
    })
}
