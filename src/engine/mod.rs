//! engine
//!
//! The versioning engine: commits, branches, ancestry, merges, review and
//! diffs over a [`Store`].
//!
//! # Architecture
//!
//! Each concern lives in its own component, and every component borrows the
//! store for the duration of one call:
//!
//! ```text
//! CommitStore ─┐
//!              ├─▶ BranchManager ─▶ MergeEngine ─▶ PullRequestWorkflow
//! AncestryWalker┘
//! DiffEngine (reads snapshots only)
//! ```
//!
//! [`Engine`] is the facade: it resolves names to records, applies the
//! configuration, and hands off to the components.
//!
//! # Invariants
//!
//! - The engine holds no durable state; everything lives in the store
//! - Branch heads move only through a store compare-and-set
//! - Caller identity and merge rights arrive as an explicit [`Actor`]
//!
//! # Example
//!
//! ```
//! use strata::core::snapshot::Snapshot;
//! use strata::core::types::Author;
//! use strata::engine::{Actor, BranchOptions, CommitDraft, Engine};
//! use serde_json::json;
//!
//! let engine = Engine::in_memory();
//! let (repo, _) = engine.init_repository("HQ", "main", false).unwrap();
//! let ann = Author::new("Ann", "ann@example.com").unwrap();
//!
//! let mut snap = Snapshot::new();
//! snap.insert("equipment/AHU-1", json!({"kw": 10}));
//! engine.commit(repo.id, "main", CommitDraft::new(snap.clone(), "Survey", ann.clone())).unwrap();
//!
//! engine.create_branch(repo.id, "upgrade", None, BranchOptions::default()).unwrap();
//! snap.insert("equipment/AHU-1", json!({"kw": 12}));
//! engine.commit(repo.id, "upgrade", CommitDraft::new(snap, "Bigger fan", ann.clone())).unwrap();
//!
//! let status = engine.status(repo.id, "upgrade").unwrap();
//! assert_eq!(status.ahead.count, 1);
//!
//! let outcome = engine.merge(repo.id, "upgrade", None, &Actor::new(ann), None).unwrap();
//! assert_eq!(outcome.kind, strata::engine::MergeKind::FastForward);
//! ```

pub mod ancestry;
pub mod branches;
pub mod commits;
pub mod diff;
pub mod error;
pub mod merge;
pub mod review;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use ancestry::{Ahead, AncestryWalker};
pub use branches::{BranchManager, BranchOptions};
pub use commits::{CommitDraft, CommitFilter, CommitStore, History};
pub use diff::{ChangeKind, DiffEngine, DiffEntry, DiffSummary};
pub use error::{EngineError, ErrorKind};
pub use merge::{MergeEngine, MergeKind, MergeOutcome};
pub use review::{BranchRef, OpenPullRequest, PrDetails, PullRequestView, PullRequestWorkflow};
pub use verify::{VerifyIssue, VerifyReport};

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::core::config::{self, Config};
use crate::core::model::{Branch, Commit, PrComment, PrStatus, PullRequest, Repository};
use crate::core::types::{Author, BranchName, CommitId, RepositoryId, UserId};
use crate::store::{InMemoryStore, Store};

/// Tunables the engine reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub short_hash_len: usize,
    /// Extra merge attempts after a lost head race.
    pub merge_retries: u32,
    /// Idle time after which a branch is considered stale.
    pub stale_after: Duration,
    pub required_approvals: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            short_hash_len: config::DEFAULT_SHORT_HASH_LEN,
            merge_retries: config::DEFAULT_MERGE_RETRIES,
            stale_after: Duration::days(i64::from(config::DEFAULT_STALE_AFTER_DAYS)),
            required_approvals: config::DEFAULT_REQUIRED_APPROVALS,
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            short_hash_len: config.short_hash_len(),
            merge_retries: config.merge_retries(),
            stale_after: Duration::days(i64::from(config.stale_after_days())),
            required_approvals: config.required_approvals(),
        }
    }
}

/// Who is acting, and what they may do.
///
/// Authentication and authorization happen outside the engine; the caller
/// passes the resolved identity and permission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub author: Author,
    /// Whether the actor may merge into protected branches.
    pub may_merge_protected: bool,
}

impl Actor {
    pub fn new(author: Author) -> Self {
        Self {
            author,
            may_merge_protected: false,
        }
    }

    pub fn with_merge_rights(mut self, allowed: bool) -> Self {
        self.may_merge_protected = allowed;
        self
    }
}

/// Where a branch stands relative to its base and the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchStatusReport {
    pub branch: Branch,
    pub head: Option<Commit>,
    pub ahead: Ahead,
    /// Default-branch commits not yet incorporated.
    pub behind: usize,
    pub upstream: BranchName,
    /// Numbers of live pull requests with this branch as source.
    pub open_pull_requests: Vec<u64>,
}

/// Facade over the engine components.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// An engine over a fresh in-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), EngineConfig::default())
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn commits(&self) -> CommitStore<'_> {
        CommitStore::new(self.store(), self.config.short_hash_len)
    }

    pub fn branches(&self) -> BranchManager<'_> {
        BranchManager::new(self.store())
    }

    pub fn ancestry(&self) -> AncestryWalker<'_> {
        AncestryWalker::new(self.store())
    }

    pub fn merger(&self) -> MergeEngine<'_> {
        MergeEngine::new(
            self.store(),
            self.config.short_hash_len,
            self.config.merge_retries,
        )
    }

    pub fn reviews(&self) -> PullRequestWorkflow<'_> {
        PullRequestWorkflow::new(self.store(), &self.config)
    }

    pub fn differ(&self) -> DiffEngine<'_> {
        DiffEngine::new(self.store())
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Create a repository and its default branch.
    pub fn init_repository(
        &self,
        name: &str,
        default_branch: &str,
        protected: bool,
    ) -> Result<(Repository, Branch), EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("repository name cannot be empty"));
        }
        let branch_name = BranchName::new(default_branch)?;
        let repository_id = RepositoryId::new();
        let branch = Branch::new_default(repository_id, branch_name, protected);
        let repository = Repository {
            id: repository_id,
            name: name.to_string(),
            default_branch: branch.id,
            created_at: branch.created_at,
        };
        let repository = self.store.insert_repository(repository, branch.clone())?;
        tracing::info!(repository = %repository.name, default_branch = %branch.name, "repository initialized");
        Ok((repository, branch))
    }

    pub fn get_repository(&self, id: RepositoryId) -> Result<Repository, EngineError> {
        Ok(self.store.get_repository(id)?)
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>, EngineError> {
        Ok(self.store.list_repositories()?)
    }

    /// Find a repository by its name.
    pub fn find_repository(&self, name: &str) -> Result<Repository, EngineError> {
        let mut found: Vec<_> = self
            .list_repositories()?
            .into_iter()
            .filter(|r| r.name == name)
            .collect();
        match found.len() {
            0 => Err(EngineError::not_found(format!("repository '{name}'"))),
            1 => Ok(found.remove(0)),
            n => Err(EngineError::validation(format!(
                "{n} repositories are named '{name}'; use an id"
            ))),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn list_branches(&self, repo: RepositoryId) -> Result<Vec<Branch>, EngineError> {
        self.branches().list_branches(repo)
    }

    pub fn get_branch(&self, repo: RepositoryId, name: &str) -> Result<Branch, EngineError> {
        self.branches().get_branch(repo, name)
    }

    /// Ahead/behind position of a branch.
    pub fn status(
        &self,
        repo: RepositoryId,
        branch_name: &str,
    ) -> Result<BranchStatusReport, EngineError> {
        let branches = self.branches();
        let branch = branches.get_branch(repo, branch_name)?;
        let upstream = branches.get_default_branch(repo)?;
        let ancestry = self.ancestry();

        let ahead = ancestry.commits_ahead(&branch)?;
        let behind = ancestry.commits_behind(&branch, &upstream)?;
        let head = branch.head.map(|id| self.store.get_commit(id)).transpose()?;
        let open_pull_requests = self
            .reviews()
            .list(repo, None)?
            .into_iter()
            .filter(|pr| pr.is_live() && pr.source_branch == branch.id)
            .map(|pr| pr.number)
            .collect();

        Ok(BranchStatusReport {
            branch,
            head,
            ahead,
            behind,
            upstream: upstream.name,
            open_pull_requests,
        })
    }

    /// Commit history.
    ///
    /// With a branch, walks from its head to the root. Without one, lists
    /// every commit of the repository newest first.
    pub fn log(
        &self,
        repo: RepositoryId,
        branch_name: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Commit>, EngineError> {
        match branch_name {
            Some(name) => {
                let branch = self.branches().get_branch(repo, name)?;
                self.commits()
                    .history(branch.id)?
                    .skip(offset)
                    .take(limit)
                    .collect()
            }
            None => {
                self.store.get_repository(repo)?;
                let filter = CommitFilter {
                    repository: repo,
                    branch: None,
                };
                self.commits().list_commits(filter, limit, offset)
            }
        }
    }

    /// Resolve a branch name or commit reference to a commit.
    pub fn resolve(&self, repo: RepositoryId, reference: &str) -> Result<Commit, EngineError> {
        if let Ok(name) = BranchName::new(reference) {
            if let Some(branch) = self.store.find_branch(repo, &name)? {
                let head = branch.head.ok_or_else(|| {
                    EngineError::not_found(format!("branch '{name}' has no commits"))
                })?;
                return Ok(self.store.get_commit(head)?);
            }
        }
        self.commits().resolve(repo, reference)
    }

    /// Structural diff between two commit references.
    pub fn diff(
        &self,
        repo: RepositoryId,
        from: &str,
        to: &str,
    ) -> Result<Vec<DiffEntry>, EngineError> {
        let a = self.resolve(repo, from)?;
        let b = self.resolve(repo, to)?;
        self.differ().diff(a.id, b.id)
    }

    pub fn verify(&self, repo: RepositoryId) -> Result<VerifyReport, EngineError> {
        verify::verify_repository(self.store(), repo)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Record a snapshot on top of a branch and advance its head.
    ///
    /// A concurrent head change surfaces as [`EngineError::Conflict`].
    pub fn commit(
        &self,
        repo: RepositoryId,
        branch_name: &str,
        draft: CommitDraft,
    ) -> Result<Commit, EngineError> {
        let branches = self.branches();
        let branch = branches.get_branch(repo, branch_name)?;
        if !branch.is_active() {
            return Err(EngineError::conflict(format!(
                "branch '{}' is {}",
                branch.name, branch.status
            )));
        }
        let commit = self
            .commits()
            .create_commit(repo, branch.id, branch.head, draft)?;
        branches.update_head(branch.id, branch.head, commit.id)?;
        Ok(commit)
    }

    /// Create a branch starting at `from` (a branch name or commit
    /// reference), or at the default branch head.
    pub fn create_branch(
        &self,
        repo: RepositoryId,
        name: &str,
        from: Option<&str>,
        options: BranchOptions,
    ) -> Result<Branch, EngineError> {
        let base = match from {
            Some(reference) => self.starting_point(repo, reference)?,
            None => self.branches().get_default_branch(repo)?.head,
        };
        self.branches().create_branch(repo, name, base, options)
    }

    /// Head of the named branch (possibly empty), or the referenced commit.
    fn starting_point(
        &self,
        repo: RepositoryId,
        reference: &str,
    ) -> Result<Option<CommitId>, EngineError> {
        if let Ok(name) = BranchName::new(reference) {
            if let Some(branch) = self.store.find_branch(repo, &name)? {
                return Ok(branch.head);
            }
        }
        Ok(Some(self.commits().resolve(repo, reference)?.id))
    }

    pub fn delete_branch(&self, repo: RepositoryId, name: &str) -> Result<Branch, EngineError> {
        let branch = self.get_branch(repo, name)?;
        self.branches().delete_branch(branch.id)
    }

    pub fn set_protected(
        &self,
        repo: RepositoryId,
        name: &str,
        protected: bool,
    ) -> Result<Branch, EngineError> {
        let branch = self.get_branch(repo, name)?;
        self.branches().set_protected(branch.id, protected)
    }

    /// Merge `source` into `target` (the default branch when omitted).
    pub fn merge(
        &self,
        repo: RepositoryId,
        source: &str,
        target: Option<&str>,
        actor: &Actor,
        message: Option<&str>,
    ) -> Result<MergeOutcome, EngineError> {
        let branches = self.branches();
        let source = branches.get_branch(repo, source)?;
        let target = match target {
            Some(name) => branches.get_branch(repo, name)?,
            None => branches.get_default_branch(repo)?,
        };
        self.merger().merge(source.id, target.id, actor, message)
    }

    /// Mark idle branches stale. Uses the configured threshold by default.
    pub fn sweep_stale(
        &self,
        repo: RepositoryId,
        threshold: Option<Duration>,
    ) -> Result<Vec<Branch>, EngineError> {
        self.branches()
            .sweep_stale(repo, threshold.unwrap_or(self.config.stale_after))
    }

    // =========================================================================
    // Pull requests
    // =========================================================================

    pub fn open_pr(
        &self,
        repo: RepositoryId,
        source: &str,
        target: Option<&str>,
        title: &str,
        author: Author,
        details: PrDetails,
    ) -> Result<PullRequest, EngineError> {
        let branches = self.branches();
        let source = branches.get_branch(repo, source)?;
        let target = match target {
            Some(name) => branches.get_branch(repo, name)?,
            None => branches.get_default_branch(repo)?,
        };
        self.reviews().open(OpenPullRequest {
            repository: repo,
            source: source.id,
            target: target.id,
            title: title.to_string(),
            description: details.description,
            author,
            assignee: details.assignee,
            priority: details.priority,
            kind: details.kind,
        })
    }

    pub fn get_pr(&self, repo: RepositoryId, number: u64) -> Result<PullRequest, EngineError> {
        self.reviews().get_by_number(repo, number)
    }

    pub fn list_prs(
        &self,
        repo: RepositoryId,
        status: Option<PrStatus>,
    ) -> Result<Vec<PullRequest>, EngineError> {
        self.reviews().list(repo, status)
    }

    pub fn describe_pr(
        &self,
        repo: RepositoryId,
        number: u64,
    ) -> Result<PullRequestView, EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().describe(pr.id)
    }

    pub fn approve_pr(
        &self,
        repo: RepositoryId,
        number: u64,
        reviewer: Author,
        comment: Option<String>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().approve(pr.id, reviewer, comment)
    }

    pub fn merge_pr(
        &self,
        repo: RepositoryId,
        number: u64,
        actor: &Actor,
        message: Option<&str>,
    ) -> Result<(PullRequest, MergeOutcome), EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().merge(pr.id, actor, message)
    }

    pub fn close_pr(
        &self,
        repo: RepositoryId,
        number: u64,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().close(pr.id, actor, reason)
    }

    pub fn add_comment(
        &self,
        repo: RepositoryId,
        number: u64,
        author: Author,
        body: &str,
    ) -> Result<PrComment, EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().add_comment(pr.id, author, body)
    }

    pub fn assign_pr(
        &self,
        repo: RepositoryId,
        number: u64,
        assignee: Option<UserId>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get_pr(repo, number)?;
        self.reviews().assign(pr.id, assignee)
    }
}
