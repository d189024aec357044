//! engine::merge
//!
//! Integrating one branch into another.
//!
//! # Algorithm
//!
//! 1. Find the common ancestor of the source and target heads.
//! 2. If it is the target head, fast-forward the target to the source head.
//! 3. Otherwise record one commit on the target whose parent is the target
//!    head and whose snapshot is the source head's snapshot, then move the
//!    target head to it.
//! 4. If the head update loses a race, start over from step 1, up to the
//!    configured number of retries.
//! 5. Mark the source merged unless it is protected or the default branch.
//!
//! Merging a source that is already marked merged reports up to date when
//! the target contains its head or a merge commit of it, so an interrupted
//! caller can finish.
//!
//! Entity-level conflicts are not detected: the source snapshot wins.

use std::fmt;

use serde::Serialize;

use super::ancestry::AncestryWalker;
use super::branches::BranchManager;
use super::commits::{CommitDraft, CommitStore};
use super::error::EngineError;
use super::Actor;
use crate::core::model::{Branch, BranchStatus};
use crate::core::types::{BranchId, CommitId};
use crate::store::Store;

/// Tag attached to synthetic merge commits.
pub const MERGE_TAG: &str = "merge";

/// How a merge was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeKind {
    /// The target head moved forward to the source head.
    FastForward,
    /// A new commit was recorded on the target.
    MergeCommit,
    /// The target already contained the source head.
    UpToDate,
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeKind::FastForward => write!(f, "fast-forward"),
            MergeKind::MergeCommit => write!(f, "merge commit"),
            MergeKind::UpToDate => write!(f, "already up to date"),
        }
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub kind: MergeKind,
    pub source: BranchId,
    pub target: BranchId,
    /// Target head after the merge.
    pub head: CommitId,
    /// Set only for [`MergeKind::MergeCommit`].
    pub merge_commit: Option<CommitId>,
    /// False when the source was left active (protected, default, or the
    /// status write failed after the merge).
    pub source_marked_merged: bool,
    /// Head updates lost to concurrent writers before this one succeeded.
    pub retries_used: u32,
}

/// Merges branches.
pub struct MergeEngine<'a> {
    store: &'a dyn Store,
    short_hash_len: usize,
    retries: u32,
}

impl<'a> MergeEngine<'a> {
    pub fn new(store: &'a dyn Store, short_hash_len: usize, retries: u32) -> Self {
        Self {
            store,
            short_hash_len,
            retries,
        }
    }

    /// Merge `source` into `target`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Forbidden`] if the target is protected and the
    ///   actor lacks merge rights
    /// - [`EngineError::Conflict`] if either branch is inactive or every
    ///   attempt lost the head race
    /// - [`EngineError::NotFound`] for a source without commits or
    ///   disjoint histories
    /// - [`EngineError::Validation`] when merging a branch into itself or
    ///   across repositories
    pub fn merge(
        &self,
        source: BranchId,
        target: BranchId,
        actor: &Actor,
        message: Option<&str>,
    ) -> Result<MergeOutcome, EngineError> {
        if source == target {
            return Err(EngineError::validation("cannot merge a branch into itself"));
        }
        let branches = BranchManager::new(self.store);
        let source_branch = branches.get_branch_by_id(source)?;
        let target_branch = branches.get_branch_by_id(target)?;
        if source_branch.repository_id != target_branch.repository_id {
            return Err(EngineError::validation(
                "source and target belong to different repositories",
            ));
        }
        if target_branch.protected && !actor.may_merge_protected {
            return Err(EngineError::forbidden(format!(
                "{} may not merge into protected branch '{}'",
                actor.author, target_branch.name
            )));
        }
        if let Some(outcome) = self.already_merged(&source_branch, &target_branch)? {
            return Ok(outcome);
        }
        if !source_branch.is_active() {
            return Err(EngineError::conflict(format!(
                "source branch '{}' is {}",
                source_branch.name, source_branch.status
            )));
        }
        let source_head = source_branch.head.ok_or_else(|| {
            EngineError::not_found(format!("branch '{}' has no commits", source_branch.name))
        })?;

        let message = message
            .map(str::to_string)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Merge branch '{}' into '{}'",
                    source_branch.name, target_branch.name
                )
            });

        let mut attempt = 0;
        let (kind, head, merge_commit) = loop {
            let target_branch = Self::active_target(&branches, target)?;
            let pass = self.attempt(
                &branches,
                &source_branch,
                source_head,
                &target_branch,
                actor,
                &message,
            );
            match pass {
                Ok(done) => break done,
                Err(EngineError::Conflict(reason)) if attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(
                        target = %target_branch.name,
                        attempt,
                        %reason,
                        "merge lost head race, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let source_marked_merged = if source_branch.protected || source_branch.is_default {
            false
        } else {
            match branches.mark_merged(source) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        source = %source_branch.name,
                        error = %e,
                        "merge succeeded but source could not be marked merged"
                    );
                    false
                }
            }
        };

        tracing::info!(
            source = %source_branch.name,
            target = %target_branch.name,
            kind = %kind,
            "branches merged"
        );
        Ok(MergeOutcome {
            kind,
            source,
            target,
            head,
            merge_commit,
            source_marked_merged,
            retries_used: attempt,
        })
    }

    /// A [`MergeKind::UpToDate`] outcome for a source already marked
    /// merged whose head the target carries.
    fn already_merged(
        &self,
        source: &Branch,
        target: &Branch,
    ) -> Result<Option<MergeOutcome>, EngineError> {
        if source.status != BranchStatus::Merged {
            return Ok(None);
        }
        let (Some(source_head), Some(target_head)) = (source.head, target.head) else {
            return Ok(None);
        };
        if !self.carries(target_head, source_head)? {
            return Ok(None);
        }
        tracing::debug!(source = %source.name, target = %target.name, "source already merged");
        Ok(Some(MergeOutcome {
            kind: MergeKind::UpToDate,
            source: source.id,
            target: target.id,
            head: target_head,
            merge_commit: None,
            source_marked_merged: true,
            retries_used: 0,
        }))
    }

    /// Whether `source_head` is an ancestor of `target_head`, or a merge
    /// commit in the target's history recorded its snapshot.
    fn carries(&self, target_head: CommitId, source_head: CommitId) -> Result<bool, EngineError> {
        let commits = CommitStore::new(self.store, self.short_hash_len);
        let mut source_snapshot = None;
        for id in AncestryWalker::new(self.store).ancestors(target_head)? {
            if id == source_head {
                return Ok(true);
            }
            if !commits.get_commit(id)?.tags.contains(MERGE_TAG) {
                continue;
            }
            if source_snapshot.is_none() {
                source_snapshot = Some(commits.get_snapshot(source_head)?);
            }
            if source_snapshot.as_ref() == Some(&commits.get_snapshot(id)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The target as currently stored; inactive targets are not retried.
    fn active_target(branches: &BranchManager<'_>, target: BranchId) -> Result<Branch, EngineError> {
        let target_branch = branches.get_branch_by_id(target)?;
        if !target_branch.is_active() {
            return Err(EngineError::conflict(format!(
                "target branch '{}' is {}",
                target_branch.name, target_branch.status
            )));
        }
        Ok(target_branch)
    }

    /// One pass of steps 1-3 against a freshly read target.
    fn attempt(
        &self,
        branches: &BranchManager<'_>,
        source: &Branch,
        source_head: CommitId,
        target_branch: &Branch,
        actor: &Actor,
        message: &str,
    ) -> Result<(MergeKind, CommitId, Option<CommitId>), EngineError> {
        let target = target_branch.id;
        let Some(target_head) = target_branch.head else {
            branches.update_head(target, None, source_head)?;
            return Ok((MergeKind::FastForward, source_head, None));
        };

        let ancestry = AncestryWalker::new(self.store);
        if ancestry.is_ancestor(source_head, target_head)? {
            return Ok((MergeKind::UpToDate, target_head, None));
        }

        let ancestor = ancestry.common_ancestor(source_head, target_head)?;
        if ancestor == target_head {
            branches.update_head(target, Some(target_head), source_head)?;
            return Ok((MergeKind::FastForward, source_head, None));
        }

        let commits = CommitStore::new(self.store, self.short_hash_len);
        let snapshot = commits.get_snapshot(source_head)?;
        let draft = CommitDraft::new(snapshot, message, actor.author.clone())
            .description(format!("Merged from branch '{}'", source.name))
            .tag(MERGE_TAG);
        let commit = commits.create_commit(
            target_branch.repository_id,
            target,
            Some(target_head),
            draft,
        )?;
        branches.update_head(target, Some(target_head), commit.id)?;
        Ok((MergeKind::MergeCommit, commit.id, Some(commit.id)))
    }
}
