//! store::state
//!
//! The record set shared by every backend, with the conditional-write rules.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::core::model::{Branch, BranchStatus, Commit, PullRequest, Repository};
use crate::core::snapshot::Snapshot;
use crate::core::types::{
    BranchId, BranchName, CommitId, ContentHash, PullRequestId, RepositoryId, UtcTimestamp,
};

type ContentKey = (RepositoryId, Option<CommitId>, ContentHash);

/// All persisted records.
///
/// Public so backends outside this crate can reuse the write rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    repositories: BTreeMap<RepositoryId, Repository>,
    branches: BTreeMap<BranchId, Branch>,
    commits: BTreeMap<CommitId, Commit>,
    snapshots: BTreeMap<CommitId, Snapshot>,
    pull_requests: BTreeMap<PullRequestId, PullRequest>,
    pr_counters: BTreeMap<RepositoryId, u64>,
    #[serde(skip)]
    by_content: HashMap<ContentKey, CommitId>,
}

fn content_key(commit: &Commit) -> ContentKey {
    (commit.repository_id, commit.parent, commit.hash.clone())
}

fn cas_failed(expected: impl ToString, actual: impl ToString) -> StoreError {
    StoreError::CasFailed {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn display_head(head: Option<CommitId>) -> String {
    head.map_or_else(|| "none".to_string(), |id| id.to_string())
}

impl StoreState {
    /// Rebuild derived indexes and check referential integrity after a load.
    pub fn reindex(&mut self) -> Result<(), StoreError> {
        self.by_content.clear();
        for commit in self.commits.values() {
            if !self.snapshots.contains_key(&commit.id) {
                return Err(StoreError::Corrupt(format!(
                    "commit {} has no snapshot",
                    commit.id
                )));
            }
            if self
                .by_content
                .insert(content_key(commit), commit.id)
                .is_some()
            {
                return Err(StoreError::Corrupt(format!(
                    "duplicate content hash {} under one parent",
                    commit.hash
                )));
            }
        }
        for branch in self.branches.values() {
            if !self.repositories.contains_key(&branch.repository_id) {
                return Err(StoreError::Corrupt(format!(
                    "branch '{}' belongs to unknown repository {}",
                    branch.name, branch.repository_id
                )));
            }
        }
        Ok(())
    }

    pub fn insert_repository(
        &mut self,
        repository: Repository,
        default_branch: Branch,
    ) -> Result<Repository, StoreError> {
        if self.repositories.contains_key(&repository.id) {
            return Err(StoreError::Duplicate(format!(
                "repository {}",
                repository.id
            )));
        }
        if default_branch.id != repository.default_branch
            || default_branch.repository_id != repository.id
        {
            return Err(StoreError::Corrupt(
                "default branch does not match repository".to_string(),
            ));
        }
        self.repositories.insert(repository.id, repository.clone());
        self.branches.insert(default_branch.id, default_branch);
        Ok(repository)
    }

    pub fn get_repository(&self, id: RepositoryId) -> Result<Repository, StoreError> {
        self.repositories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("repository {id}")))
    }

    pub fn list_repositories(&self) -> Vec<Repository> {
        let mut repos: Vec<_> = self.repositories.values().cloned().collect();
        repos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        repos
    }

    pub fn insert_branch(&mut self, branch: Branch) -> Result<Branch, StoreError> {
        if !self.repositories.contains_key(&branch.repository_id) {
            return Err(StoreError::NotFound(format!(
                "repository {}",
                branch.repository_id
            )));
        }
        if self.find_branch(branch.repository_id, &branch.name).is_some() {
            return Err(StoreError::Duplicate(format!("branch '{}'", branch.name)));
        }
        self.branches.insert(branch.id, branch.clone());
        Ok(branch)
    }

    pub fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.branches
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("branch {id}")))
    }

    pub fn find_branch(&self, repository: RepositoryId, name: &BranchName) -> Option<Branch> {
        self.branches
            .values()
            .find(|b| b.repository_id == repository && &b.name == name)
            .cloned()
    }

    pub fn list_branches(&self, repository: RepositoryId) -> Vec<Branch> {
        let mut branches: Vec<_> = self
            .branches
            .values()
            .filter(|b| b.repository_id == repository)
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }

    fn branch_mut(&mut self, id: BranchId) -> Result<&mut Branch, StoreError> {
        self.branches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("branch {id}")))
    }

    pub fn update_branch_head(
        &mut self,
        id: BranchId,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<Branch, StoreError> {
        if !self.commits.contains_key(&new) {
            return Err(StoreError::NotFound(format!("commit {new}")));
        }
        let branch = self.branch_mut(id)?;
        if branch.status != BranchStatus::Active {
            return Err(cas_failed(BranchStatus::Active, branch.status));
        }
        if branch.head != expected {
            return Err(cas_failed(display_head(expected), display_head(branch.head)));
        }
        branch.head = Some(new);
        // The first commit on an empty branch also fixes its base.
        if branch.base.is_none() {
            branch.base = Some(new);
        }
        branch.updated_at = UtcTimestamp::now();
        Ok(branch.clone())
    }

    pub fn update_branch_status(
        &mut self,
        id: BranchId,
        expected: BranchStatus,
        new: BranchStatus,
    ) -> Result<Branch, StoreError> {
        let branch = self.branch_mut(id)?;
        if branch.status != expected {
            return Err(cas_failed(expected, branch.status));
        }
        branch.status = new;
        branch.updated_at = UtcTimestamp::now();
        Ok(branch.clone())
    }

    pub fn set_branch_protected(
        &mut self,
        id: BranchId,
        protected: bool,
    ) -> Result<Branch, StoreError> {
        let branch = self.branch_mut(id)?;
        branch.protected = protected;
        branch.updated_at = UtcTimestamp::now();
        Ok(branch.clone())
    }

    pub fn delete_branch(&mut self, id: BranchId) -> Result<Branch, StoreError> {
        self.branches
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("branch {id}")))
    }

    pub fn insert_commit(
        &mut self,
        commit: Commit,
        snapshot: Snapshot,
    ) -> Result<Commit, StoreError> {
        let key = content_key(&commit);
        if let Some(existing) = self.by_content.get(&key) {
            return self.get_commit(*existing);
        }
        if self.commits.contains_key(&commit.id) {
            return Err(StoreError::Duplicate(format!("commit {}", commit.id)));
        }
        self.by_content.insert(key, commit.id);
        self.snapshots.insert(commit.id, snapshot);
        self.commits.insert(commit.id, commit.clone());
        Ok(commit)
    }

    pub fn get_commit(&self, id: CommitId) -> Result<Commit, StoreError> {
        self.commits
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("commit {id}")))
    }

    pub fn get_snapshot(&self, id: CommitId) -> Result<Snapshot, StoreError> {
        self.snapshots
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("snapshot for commit {id}")))
    }

    pub fn list_commits(&self, repository: RepositoryId, branch: Option<BranchId>) -> Vec<Commit> {
        let mut commits: Vec<_> = self
            .commits
            .values()
            .filter(|c| c.repository_id == repository)
            .filter(|c| branch.map_or(true, |b| c.branch_id == b))
            .cloned()
            .collect();
        commits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        commits
    }

    pub fn insert_pull_request(&mut self, mut pr: PullRequest) -> Result<PullRequest, StoreError> {
        if !self.repositories.contains_key(&pr.repository_id) {
            return Err(StoreError::NotFound(format!(
                "repository {}",
                pr.repository_id
            )));
        }
        if self.pull_requests.contains_key(&pr.id) {
            return Err(StoreError::Duplicate(format!("pull request {}", pr.id)));
        }
        let counter = self.pr_counters.entry(pr.repository_id).or_insert(0);
        *counter += 1;
        pr.number = *counter;
        self.pull_requests.insert(pr.id, pr.clone());
        Ok(pr)
    }

    pub fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest, StoreError> {
        self.pull_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("pull request {id}")))
    }

    pub fn find_pull_request(&self, repository: RepositoryId, number: u64) -> Option<PullRequest> {
        self.pull_requests
            .values()
            .find(|pr| pr.repository_id == repository && pr.number == number)
            .cloned()
    }

    pub fn list_pull_requests(&self, repository: RepositoryId) -> Vec<PullRequest> {
        let mut prs: Vec<_> = self
            .pull_requests
            .values()
            .filter(|pr| pr.repository_id == repository)
            .cloned()
            .collect();
        prs.sort_by_key(|pr| pr.number);
        prs
    }

    pub fn update_pull_request(
        &mut self,
        pr: PullRequest,
        expected_revision: u64,
    ) -> Result<PullRequest, StoreError> {
        let stored = self
            .pull_requests
            .get_mut(&pr.id)
            .ok_or_else(|| StoreError::NotFound(format!("pull request {}", pr.id)))?;
        if stored.revision != expected_revision {
            return Err(cas_failed(
                format!("revision {expected_revision}"),
                format!("revision {}", stored.revision),
            ));
        }
        *stored = pr.clone();
        Ok(pr)
    }
}
