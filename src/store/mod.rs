//! store
//!
//! Persisted entity store.
//!
//! # Architecture
//!
//! The engine never holds durable state itself. Everything lives behind the
//! [`Store`] trait, which offers ID-indexed reads and a small set of
//! conditional writes. Two backends are provided:
//!
//! - [`InMemoryStore`] - one mutex-guarded critical section per call
//! - [`FileStore`] - a JSON document rewritten under an exclusive file lock
//!
//! Both backends share [`StoreState`], so the conditional-write rules are
//! implemented exactly once.
//!
//! # Invariants
//!
//! - `(repository, parent, hash)` is unique among commits
//! - Branch names are unique within a repository
//! - Head and status writes succeed only when the stored value matches the
//!   caller's expectation
//! - Pull request writes succeed only when the stored revision matches

pub mod file;
pub mod lock;
pub mod memory;
mod state;

pub use file::{FileStore, STORE_KIND, STORE_SCHEMA_VERSION};
pub use lock::{LockError, StoreLock};
pub use memory::{FailOn, InMemoryStore};
pub use state::StoreState;

use thiserror::Error;

use crate::core::model::{Branch, BranchStatus, Commit, PullRequest, Repository};
use crate::core::snapshot::Snapshot;
use crate::core::types::{BranchId, BranchName, CommitId, PullRequestId, RepositoryId};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write lost to a concurrent change.
    #[error("CAS precondition failed: expected {expected}, found {actual}")]
    CasFailed {
        /// What the caller expected to find
        expected: String,
        /// What the store actually holds
        actual: String,
    },

    /// A uniqueness constraint was violated.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The persisted data is unreadable or inconsistent.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// Filesystem failure.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode the store document.
    #[error("failed to serialize store: {0}")]
    Serialize(String),

    /// Failed to take the store lock.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Durable storage for repositories, branches, commits and pull requests.
///
/// Implementations must make every method atomic with respect to every
/// other method on the same store.
pub trait Store: Send + Sync {
    /// Insert a repository together with its default branch.
    fn insert_repository(
        &self,
        repository: Repository,
        default_branch: Branch,
    ) -> Result<Repository, StoreError>;

    fn get_repository(&self, id: RepositoryId) -> Result<Repository, StoreError>;

    fn list_repositories(&self) -> Result<Vec<Repository>, StoreError>;

    /// Insert a branch. Fails with `Duplicate` if the name is taken.
    fn insert_branch(&self, branch: Branch) -> Result<Branch, StoreError>;

    fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError>;

    fn find_branch(
        &self,
        repository: RepositoryId,
        name: &BranchName,
    ) -> Result<Option<Branch>, StoreError>;

    /// All branches of a repository, ordered by name.
    fn list_branches(&self, repository: RepositoryId) -> Result<Vec<Branch>, StoreError>;

    /// Move a branch head if it still equals `expected` and the branch is
    /// still active.
    fn update_branch_head(
        &self,
        id: BranchId,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<Branch, StoreError>;

    /// Change a branch status if it still equals `expected`.
    fn update_branch_status(
        &self,
        id: BranchId,
        expected: BranchStatus,
        new: BranchStatus,
    ) -> Result<Branch, StoreError>;

    fn set_branch_protected(&self, id: BranchId, protected: bool) -> Result<Branch, StoreError>;

    fn delete_branch(&self, id: BranchId) -> Result<Branch, StoreError>;

    /// Insert a commit and its snapshot.
    ///
    /// If a commit with the same repository, parent and hash exists it is
    /// returned unchanged and nothing is written.
    fn insert_commit(&self, commit: Commit, snapshot: Snapshot) -> Result<Commit, StoreError>;

    fn get_commit(&self, id: CommitId) -> Result<Commit, StoreError>;

    fn get_snapshot(&self, id: CommitId) -> Result<Snapshot, StoreError>;

    /// Commits of a repository, optionally restricted to the branch they
    /// were created on, newest first with ties broken by ID.
    fn list_commits(
        &self,
        repository: RepositoryId,
        branch: Option<BranchId>,
    ) -> Result<Vec<Commit>, StoreError>;

    /// Insert a pull request, assigning the next per-repository number.
    fn insert_pull_request(&self, pr: PullRequest) -> Result<PullRequest, StoreError>;

    fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest, StoreError>;

    fn find_pull_request(
        &self,
        repository: RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, StoreError>;

    /// All pull requests of a repository, ordered by number.
    fn list_pull_requests(&self, repository: RepositoryId)
        -> Result<Vec<PullRequest>, StoreError>;

    /// Replace a pull request if the stored revision equals
    /// `expected_revision`.
    fn update_pull_request(
        &self,
        pr: PullRequest,
        expected_revision: u64,
    ) -> Result<PullRequest, StoreError>;
}
