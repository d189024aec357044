//! store::memory
//!
//! In-memory store for tests and embedding.
//!
//! # Design
//!
//! All records live in one [`StoreState`] behind a mutex. Every trait call is
//! a single critical section, which is what makes the conditional writes
//! atomic. Clones share the same state.
//!
//! Failures can be injected with [`InMemoryStore::fail_on`] to exercise
//! lost-race paths deterministically.
//!
//! # Example
//!
//! ```
//! use strata::store::{InMemoryStore, Store};
//!
//! let store = InMemoryStore::new();
//! assert!(store.list_repositories().unwrap().is_empty());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Store, StoreError, StoreState};
use crate::core::model::{Branch, BranchStatus, Commit, PullRequest, Repository};
use crate::core::snapshot::Snapshot;
use crate::core::types::{BranchId, BranchName, CommitId, PullRequestId, RepositoryId};

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    state: StoreState,
    fail_on: Option<FailOn>,
}

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Report a lost race on the next `remaining` head updates.
    HeadUpdate { remaining: u32 },
    /// Report a lost race on the next `remaining` pull request updates.
    PullRequestUpdate { remaining: u32 },
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing record set.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                fail_on: None,
            })),
        }
    }

    /// Copy of the current record set.
    pub fn dump(&self) -> StoreState {
        self.inner
            .lock()
            .map(|inner| inner.state.clone())
            .unwrap_or_default()
    }

    /// Inject failures for subsequent calls.
    pub fn fail_on(&self, fail_on: FailOn) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_on = Some(fail_on);
        }
    }

    /// Stop injecting failures.
    pub fn clear_fail_on(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_on = None;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Corrupt("store mutex poisoned".to_string()))
    }
}

impl Inner {
    /// Consume one injected head failure, if armed.
    fn take_head_failure(&mut self) -> bool {
        match &mut self.fail_on {
            Some(FailOn::HeadUpdate { remaining }) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_pr_failure(&mut self) -> bool {
        match &mut self.fail_on {
            Some(FailOn::PullRequestUpdate { remaining }) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

fn injected() -> StoreError {
    StoreError::CasFailed {
        expected: "current value".to_string(),
        actual: "concurrent write (injected)".to_string(),
    }
}

impl Store for InMemoryStore {
    fn insert_repository(
        &self,
        repository: Repository,
        default_branch: Branch,
    ) -> Result<Repository, StoreError> {
        self.lock()?
            .state
            .insert_repository(repository, default_branch)
    }

    fn get_repository(&self, id: RepositoryId) -> Result<Repository, StoreError> {
        self.lock()?.state.get_repository(id)
    }

    fn list_repositories(&self) -> Result<Vec<Repository>, StoreError> {
        Ok(self.lock()?.state.list_repositories())
    }

    fn insert_branch(&self, branch: Branch) -> Result<Branch, StoreError> {
        self.lock()?.state.insert_branch(branch)
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.lock()?.state.get_branch(id)
    }

    fn find_branch(
        &self,
        repository: RepositoryId,
        name: &BranchName,
    ) -> Result<Option<Branch>, StoreError> {
        Ok(self.lock()?.state.find_branch(repository, name))
    }

    fn list_branches(&self, repository: RepositoryId) -> Result<Vec<Branch>, StoreError> {
        Ok(self.lock()?.state.list_branches(repository))
    }

    fn update_branch_head(
        &self,
        id: BranchId,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<Branch, StoreError> {
        let mut inner = self.lock()?;
        if inner.take_head_failure() {
            return Err(injected());
        }
        inner.state.update_branch_head(id, expected, new)
    }

    fn update_branch_status(
        &self,
        id: BranchId,
        expected: BranchStatus,
        new: BranchStatus,
    ) -> Result<Branch, StoreError> {
        self.lock()?.state.update_branch_status(id, expected, new)
    }

    fn set_branch_protected(&self, id: BranchId, protected: bool) -> Result<Branch, StoreError> {
        self.lock()?.state.set_branch_protected(id, protected)
    }

    fn delete_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.lock()?.state.delete_branch(id)
    }

    fn insert_commit(&self, commit: Commit, snapshot: Snapshot) -> Result<Commit, StoreError> {
        self.lock()?.state.insert_commit(commit, snapshot)
    }

    fn get_commit(&self, id: CommitId) -> Result<Commit, StoreError> {
        self.lock()?.state.get_commit(id)
    }

    fn get_snapshot(&self, id: CommitId) -> Result<Snapshot, StoreError> {
        self.lock()?.state.get_snapshot(id)
    }

    fn list_commits(
        &self,
        repository: RepositoryId,
        branch: Option<BranchId>,
    ) -> Result<Vec<Commit>, StoreError> {
        Ok(self.lock()?.state.list_commits(repository, branch))
    }

    fn insert_pull_request(&self, pr: PullRequest) -> Result<PullRequest, StoreError> {
        self.lock()?.state.insert_pull_request(pr)
    }

    fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest, StoreError> {
        self.lock()?.state.get_pull_request(id)
    }

    fn find_pull_request(
        &self,
        repository: RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, StoreError> {
        Ok(self.lock()?.state.find_pull_request(repository, number))
    }

    fn list_pull_requests(
        &self,
        repository: RepositoryId,
    ) -> Result<Vec<PullRequest>, StoreError> {
        Ok(self.lock()?.state.list_pull_requests(repository))
    }

    fn update_pull_request(
        &self,
        pr: PullRequest,
        expected_revision: u64,
    ) -> Result<PullRequest, StoreError> {
        let mut inner = self.lock()?;
        if inner.take_pr_failure() {
            return Err(injected());
        }
        inner.state.update_pull_request(pr, expected_revision)
    }
}
