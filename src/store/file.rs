//! store::file
//!
//! JSON-document store on the local filesystem.
//!
//! # Format
//!
//! The whole record set lives in one self-describing document:
//!
//! ```json
//! {
//!   "kind": "strata.store",
//!   "schema_version": 1,
//!   "records": { "repositories": {}, "branches": {}, "commits": {}, ... }
//! }
//! ```
//!
//! The envelope (`kind`, `schema_version`) is parsed first so unknown
//! versions are rejected before the records are touched.
//!
//! # Atomicity
//!
//! Every call takes the [`StoreLock`], reads the document, applies the
//! operation to the in-memory [`StoreState`], and on success writes the
//! document to a temporary file that is renamed over the original. A failed
//! operation leaves the document untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::lock::StoreLock;
use super::{Store, StoreError, StoreState};
use crate::core::model::{Branch, BranchStatus, Commit, PullRequest, Repository};
use crate::core::snapshot::Snapshot;
use crate::core::types::{BranchId, BranchName, CommitId, PullRequestId, RepositoryId};

/// The kind identifier for store documents.
pub const STORE_KIND: &str = "strata.store";

/// Current document schema version.
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Envelope for version dispatch before full parsing.
#[derive(Deserialize)]
struct Envelope {
    kind: String,
    schema_version: u32,
}

#[derive(Serialize, Deserialize)]
struct StoreDocumentV1 {
    kind: String,
    schema_version: u32,
    records: StoreState,
}

/// Parse a store document, checking kind and version.
fn parse_document(json: &str) -> Result<StoreState, StoreError> {
    let envelope: Envelope = serde_json::from_str(json)
        .map_err(|e| StoreError::Corrupt(format!("invalid store envelope: {e}")))?;

    if envelope.kind != STORE_KIND {
        return Err(StoreError::Corrupt(format!(
            "invalid kind '{}', expected '{}'",
            envelope.kind, STORE_KIND
        )));
    }

    match envelope.schema_version {
        1 => {
            let doc: StoreDocumentV1 = serde_json::from_str(json)
                .map_err(|e| StoreError::Corrupt(format!("invalid store document: {e}")))?;
            let mut state = doc.records;
            state.reindex()?;
            Ok(state)
        }
        v => Err(StoreError::Corrupt(format!(
            "unsupported schema version {v}, supported: {STORE_SCHEMA_VERSION}"
        ))),
    }
}

/// Store backed by a JSON document.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open a store at `path`. The document is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document has been written yet.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> Result<StoreState, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parse_document(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, state: StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let doc = StoreDocumentV1 {
            kind: STORE_KIND.to_string(),
            schema_version: STORE_SCHEMA_VERSION,
            records: state,
        };
        let contents =
            serde_json::to_vec_pretty(&doc).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), bytes = contents.len(), "store saved");
        Ok(())
    }

    /// Run a read-only operation under the lock.
    fn read<T>(&self, op: impl FnOnce(&StoreState) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.path)?;
        let state = self.load()?;
        op(&state)
    }

    /// Run a mutating operation under the lock, persisting on success.
    fn write<T>(
        &self,
        op: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.path)?;
        let mut state = self.load()?;
        let out = op(&mut state)?;
        self.save(state)?;
        Ok(out)
    }
}

impl Store for FileStore {
    fn insert_repository(
        &self,
        repository: Repository,
        default_branch: Branch,
    ) -> Result<Repository, StoreError> {
        self.write(|s| s.insert_repository(repository, default_branch))
    }

    fn get_repository(&self, id: RepositoryId) -> Result<Repository, StoreError> {
        self.read(|s| s.get_repository(id))
    }

    fn list_repositories(&self) -> Result<Vec<Repository>, StoreError> {
        self.read(|s| Ok(s.list_repositories()))
    }

    fn insert_branch(&self, branch: Branch) -> Result<Branch, StoreError> {
        self.write(|s| s.insert_branch(branch))
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.read(|s| s.get_branch(id))
    }

    fn find_branch(
        &self,
        repository: RepositoryId,
        name: &BranchName,
    ) -> Result<Option<Branch>, StoreError> {
        self.read(|s| Ok(s.find_branch(repository, name)))
    }

    fn list_branches(&self, repository: RepositoryId) -> Result<Vec<Branch>, StoreError> {
        self.read(|s| Ok(s.list_branches(repository)))
    }

    fn update_branch_head(
        &self,
        id: BranchId,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<Branch, StoreError> {
        self.write(|s| s.update_branch_head(id, expected, new))
    }

    fn update_branch_status(
        &self,
        id: BranchId,
        expected: BranchStatus,
        new: BranchStatus,
    ) -> Result<Branch, StoreError> {
        self.write(|s| s.update_branch_status(id, expected, new))
    }

    fn set_branch_protected(&self, id: BranchId, protected: bool) -> Result<Branch, StoreError> {
        self.write(|s| s.set_branch_protected(id, protected))
    }

    fn delete_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.write(|s| s.delete_branch(id))
    }

    fn insert_commit(&self, commit: Commit, snapshot: Snapshot) -> Result<Commit, StoreError> {
        self.write(|s| s.insert_commit(commit, snapshot))
    }

    fn get_commit(&self, id: CommitId) -> Result<Commit, StoreError> {
        self.read(|s| s.get_commit(id))
    }

    fn get_snapshot(&self, id: CommitId) -> Result<Snapshot, StoreError> {
        self.read(|s| s.get_snapshot(id))
    }

    fn list_commits(
        &self,
        repository: RepositoryId,
        branch: Option<BranchId>,
    ) -> Result<Vec<Commit>, StoreError> {
        self.read(|s| Ok(s.list_commits(repository, branch)))
    }

    fn insert_pull_request(&self, pr: PullRequest) -> Result<PullRequest, StoreError> {
        self.write(|s| s.insert_pull_request(pr))
    }

    fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest, StoreError> {
        self.read(|s| s.get_pull_request(id))
    }

    fn find_pull_request(
        &self,
        repository: RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, StoreError> {
        self.read(|s| Ok(s.find_pull_request(repository, number)))
    }

    fn list_pull_requests(
        &self,
        repository: RepositoryId,
    ) -> Result<Vec<PullRequest>, StoreError> {
        self.read(|s| Ok(s.list_pull_requests(repository)))
    }

    fn update_pull_request(
        &self,
        pr: PullRequest,
        expected_revision: u64,
    ) -> Result<PullRequest, StoreError> {
        self.write(|s| s.update_pull_request(pr, expected_revision))
    }
}
