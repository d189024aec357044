//! Shared fixture for engine unit tests.

use serde_json::json;

use super::{
    Actor, AncestryWalker, BranchManager, CommitDraft, CommitStore, EngineConfig, MergeEngine,
    PullRequestWorkflow,
};
use crate::core::model::{Branch, Repository};
use crate::core::snapshot::Snapshot;
use crate::core::types::{Author, BranchId, BranchName, CommitId, RepositoryId};
use crate::store::{InMemoryStore, Store};

/// A repository with an unprotected, empty default branch `main`.
pub(crate) struct Fixture {
    pub store: InMemoryStore,
    pub config: EngineConfig,
    pub repo: Repository,
    pub main: BranchId,
}

impl Fixture {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let (repo, main) = seed_repository(&store, "Tower");
        Self {
            store,
            config: EngineConfig::default(),
            repo,
            main,
        }
    }

    pub fn commits(&self) -> CommitStore<'_> {
        CommitStore::new(&self.store, self.config.short_hash_len)
    }

    pub fn branches(&self) -> BranchManager<'_> {
        BranchManager::new(&self.store)
    }

    pub fn ancestry(&self) -> AncestryWalker<'_> {
        AncestryWalker::new(&self.store)
    }

    pub fn merger(&self) -> MergeEngine<'_> {
        MergeEngine::new(
            &self.store,
            self.config.short_hash_len,
            self.config.merge_retries,
        )
    }

    pub fn reviews(&self) -> PullRequestWorkflow<'_> {
        PullRequestWorkflow::new(&self.store, &self.config)
    }

    pub fn author(&self) -> Author {
        Author::new("Ann", "ann@example.com").unwrap()
    }

    /// An actor allowed to merge into protected branches.
    pub fn actor(&self) -> Actor {
        Actor::new(self.author()).with_merge_rights(true)
    }

    pub fn draft(&self, snapshot: Snapshot, message: &str) -> CommitDraft {
        CommitDraft::new(snapshot, message, self.author())
    }

    /// Another repository in the same store.
    pub fn second_repository(&self) -> (RepositoryId, BranchId) {
        let (repo, main) = seed_repository(&self.store, "Annex");
        (repo.id, main)
    }

    /// Create a commit whose snapshot is derived from `message`. Does not
    /// move any head.
    pub fn commit_on(
        &self,
        repo: RepositoryId,
        branch: BranchId,
        parent: Option<CommitId>,
        message: &str,
    ) -> CommitId {
        let mut snapshot = Snapshot::new();
        snapshot.insert("notes/log", json!({ "entry": message }));
        self.commits()
            .create_commit(repo, branch, parent, self.draft(snapshot, message))
            .unwrap()
            .id
    }

    /// A chain of `n` commits on main, oldest first. The head is left alone.
    pub fn linear_history(&self, n: usize) -> Vec<CommitId> {
        let mut ids: Vec<CommitId> = Vec::with_capacity(n);
        for i in 0..n {
            let id = self.commit_on(self.repo.id, self.main, ids.last().copied(), &format!("c{i}"));
            ids.push(id);
        }
        ids
    }

    /// Move a head, bypassing the engine's checks.
    pub fn set_head(&self, branch: BranchId, expected: Option<CommitId>, new: CommitId) -> Branch {
        self.store.update_branch_head(branch, expected, new).unwrap()
    }
}

fn seed_repository(store: &InMemoryStore, name: &str) -> (Repository, BranchId) {
    let repo_id = RepositoryId::new();
    let main = Branch::new_default(repo_id, BranchName::new("main").unwrap(), false);
    let main_id = main.id;
    let repo = Repository {
        id: repo_id,
        name: name.to_string(),
        default_branch: main_id,
        created_at: main.created_at,
    };
    let repo = store.insert_repository(repo, main).unwrap();
    (repo, main_id)
}
