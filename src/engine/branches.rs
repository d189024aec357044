//! engine::branches
//!
//! Branch lifecycle: creation, head movement and status transitions.
//!
//! # Head Updates
//!
//! A head moves only through [`BranchManager::update_head`], which carries
//! the caller's expectation of the current head. The store performs the
//! final compare-and-set, so two racing updates from the same expectation
//! produce exactly one winner and one [`EngineError::Conflict`].
//!
//! # Invariants
//!
//! - A head is always reachable from its base
//! - A protected head only moves forward (to a descendant)
//! - Protected and default branches never change status
//! - Only active branches accept head updates

use chrono::Duration;

use super::ancestry::AncestryWalker;
use super::error::EngineError;
use crate::core::model::{Branch, BranchStatus, BranchType};
use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId, UtcTimestamp};
use crate::store::Store;

/// Options for [`BranchManager::create_branch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchOptions {
    pub branch_type: BranchType,
    pub protected: bool,
}

/// Branch lifecycle operations.
pub struct BranchManager<'a> {
    store: &'a dyn Store,
}

impl<'a> BranchManager<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn ancestry(&self) -> AncestryWalker<'a> {
        AncestryWalker::new(self.store)
    }

    /// Create an active branch whose head starts at `base`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for an invalid name, a foreign or
    ///   unknown base, or the reserved `default` type
    /// - [`EngineError::Conflict`] if the name is taken
    pub fn create_branch(
        &self,
        repository: RepositoryId,
        name: &str,
        base: Option<CommitId>,
        options: BranchOptions,
    ) -> Result<Branch, EngineError> {
        let name = BranchName::new(name)?;
        if options.branch_type == BranchType::Default {
            return Err(EngineError::validation(
                "only the repository's default branch may have type 'default'",
            ));
        }
        self.store.get_repository(repository)?;

        if let Some(base) = base {
            let commit = self.store.get_commit(base).map_err(|_| {
                EngineError::validation(format!("base commit {base} does not exist"))
            })?;
            if commit.repository_id != repository {
                return Err(EngineError::validation(format!(
                    "base commit {base} belongs to another repository"
                )));
            }
        }

        let branch = Branch::new(repository, name, base, options.branch_type, options.protected);
        let branch = self.store.insert_branch(branch)?;
        tracing::info!(branch = %branch.name, kind = %branch.branch_type, "branch created");
        Ok(branch)
    }

    pub fn get_branch(&self, repository: RepositoryId, name: &str) -> Result<Branch, EngineError> {
        let name = BranchName::new(name)?;
        self.store
            .find_branch(repository, &name)?
            .ok_or_else(|| EngineError::not_found(format!("branch '{name}'")))
    }

    pub fn get_branch_by_id(&self, id: BranchId) -> Result<Branch, EngineError> {
        Ok(self.store.get_branch(id)?)
    }

    pub fn get_default_branch(&self, repository: RepositoryId) -> Result<Branch, EngineError> {
        let repo = self.store.get_repository(repository)?;
        Ok(self.store.get_branch(repo.default_branch)?)
    }

    pub fn list_branches(&self, repository: RepositoryId) -> Result<Vec<Branch>, EngineError> {
        self.store.get_repository(repository)?;
        Ok(self.store.list_branches(repository)?)
    }

    /// Move a branch head from `expected` to `new`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Conflict`] if the head is no longer `expected` or
    ///   the branch is not active
    /// - [`EngineError::Forbidden`] if a protected head would move to a
    ///   commit that does not descend from it
    /// - [`EngineError::Validation`] if `new` is foreign or not reachable
    ///   from the branch base
    pub fn update_head(
        &self,
        id: BranchId,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<Branch, EngineError> {
        let branch = self.store.get_branch(id)?;
        if !branch.is_active() {
            return Err(EngineError::conflict(format!(
                "branch '{}' is {}",
                branch.name, branch.status
            )));
        }
        if branch.head != expected {
            return Err(EngineError::conflict(format!(
                "branch '{}' head changed since it was read",
                branch.name
            )));
        }

        let commit = self.store.get_commit(new)?;
        if commit.repository_id != branch.repository_id {
            return Err(EngineError::validation(format!(
                "commit {new} belongs to another repository"
            )));
        }

        let ancestry = self.ancestry();
        if branch.protected {
            if let Some(head) = branch.head {
                if !ancestry.is_ancestor(head, new)? {
                    return Err(EngineError::forbidden(format!(
                        "protected branch '{}' only accepts fast-forward updates",
                        branch.name
                    )));
                }
            }
        }
        if let Some(base) = branch.base {
            if !ancestry.is_ancestor(base, new)? {
                return Err(EngineError::validation(format!(
                    "commit {} is not reachable from the base of '{}'",
                    commit.short_hash, branch.name
                )));
            }
        }

        let updated = self.store.update_branch_head(id, expected, new)?;
        tracing::debug!(branch = %updated.name, head = %commit.short_hash, "head updated");
        Ok(updated)
    }

    fn check_status_change(&self, branch: &Branch, to: BranchStatus) -> Result<(), EngineError> {
        if branch.is_default || branch.protected {
            return Err(EngineError::forbidden(format!(
                "branch '{}' is {} and cannot be marked {}",
                branch.name,
                if branch.is_default { "the default branch" } else { "protected" },
                to
            )));
        }
        if !branch.is_active() {
            return Err(EngineError::conflict(format!(
                "branch '{}' is already {}",
                branch.name, branch.status
            )));
        }
        Ok(())
    }

    pub fn mark_merged(&self, id: BranchId) -> Result<Branch, EngineError> {
        let branch = self.store.get_branch(id)?;
        self.check_status_change(&branch, BranchStatus::Merged)?;
        let branch =
            self.store
                .update_branch_status(id, BranchStatus::Active, BranchStatus::Merged)?;
        tracing::info!(branch = %branch.name, "branch marked merged");
        Ok(branch)
    }

    /// Mark the branch stale if it has been idle for at least `threshold`.
    ///
    /// Idle time runs from the later of the branch's last update and its
    /// head commit. Returns whether the branch was marked.
    pub fn mark_stale(&self, id: BranchId, threshold: Duration) -> Result<bool, EngineError> {
        let branch = self.store.get_branch(id)?;
        self.check_status_change(&branch, BranchStatus::Stale)?;

        let mut last_activity = branch.updated_at;
        if let Some(head) = branch.head {
            last_activity = last_activity.max(self.store.get_commit(head)?.created_at);
        }
        if last_activity.age(UtcTimestamp::now()) < threshold {
            return Ok(false);
        }

        self.store
            .update_branch_status(id, BranchStatus::Active, BranchStatus::Stale)?;
        tracing::info!(branch = %branch.name, idle_since = %last_activity, "branch marked stale");
        Ok(true)
    }

    /// Apply the inactivity policy to every eligible branch.
    ///
    /// Returns the branches that were marked stale.
    pub fn sweep_stale(
        &self,
        repository: RepositoryId,
        threshold: Duration,
    ) -> Result<Vec<Branch>, EngineError> {
        let mut marked = Vec::new();
        for branch in self.list_branches(repository)? {
            if branch.is_default || branch.protected || !branch.is_active() {
                continue;
            }
            match self.mark_stale(branch.id, threshold) {
                Ok(true) => marked.push(self.store.get_branch(branch.id)?),
                Ok(false) => {}
                // Another writer changed the branch first; leave it alone.
                Err(EngineError::Conflict(reason)) | Err(EngineError::Forbidden(reason)) => {
                    tracing::debug!(branch = %branch.name, %reason, "skipped during stale sweep");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(marked)
    }

    pub fn set_protected(&self, id: BranchId, protected: bool) -> Result<Branch, EngineError> {
        let branch = self.store.set_branch_protected(id, protected)?;
        tracing::info!(branch = %branch.name, protected, "branch protection changed");
        Ok(branch)
    }

    /// Delete a branch. Its commits and pull requests remain.
    pub fn delete_branch(&self, id: BranchId) -> Result<Branch, EngineError> {
        let branch = self.store.get_branch(id)?;
        if branch.is_default {
            return Err(EngineError::forbidden(format!(
                "'{}' is the default branch",
                branch.name
            )));
        }
        if branch.protected {
            return Err(EngineError::forbidden(format!(
                "branch '{}' is protected",
                branch.name
            )));
        }
        let deleted = self.store.delete_branch(id)?;
        tracing::info!(branch = %deleted.name, "branch deleted");
        Ok(deleted)
    }
}
