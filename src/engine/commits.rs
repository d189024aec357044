//! engine::commits
//!
//! Creating and reading immutable commits.
//!
//! # Hashing
//!
//! A commit's content hash is `SHA-256("parent " + parent_hash + "\0" +
//! canonical snapshot bytes)`. Message, author and time are not hashed, so
//! recording the same content on the same parent twice yields the existing
//! commit instead of a new one.
//!
//! # Example
//!
//! ```
//! use strata::core::snapshot::Snapshot;
//! use strata::core::types::Author;
//! use strata::engine::{CommitDraft, Engine};
//!
//! let engine = Engine::in_memory();
//! let (repo, _) = engine.init_repository("HQ", "main", false).unwrap();
//!
//! let author = Author::new("Ann", "ann@example.com").unwrap();
//! let draft = CommitDraft::new(Snapshot::new(), "Initial survey", author);
//! let commit = engine.commit(repo.id, "main", draft).unwrap();
//! assert!(commit.is_root());
//! ```

use std::collections::{BTreeSet, HashSet};

use super::error::EngineError;
use crate::core::model::Commit;
use crate::core::snapshot::Snapshot;
use crate::core::types::{
    Author, BranchId, CommitId, ContentHash, RepositoryId, UtcTimestamp,
};
use crate::store::Store;

/// Shortest hash prefix accepted by [`CommitStore::resolve`].
pub const MIN_PREFIX_LEN: usize = 4;

/// The caller-supplied part of a new commit.
#[derive(Debug, Clone)]
pub struct CommitDraft {
    pub snapshot: Snapshot,
    pub message: String,
    pub description: Option<String>,
    pub author: Author,
    pub tags: BTreeSet<String>,
    /// Explicit commit time, for imported history. Defaults to now.
    pub created_at: Option<UtcTimestamp>,
}

impl CommitDraft {
    pub fn new(snapshot: Snapshot, message: impl Into<String>, author: Author) -> Self {
        Self {
            snapshot,
            message: message.into(),
            description: None,
            author,
            tags: BTreeSet::new(),
            created_at: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn at(mut self, created_at: UtcTimestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Which commits [`CommitStore::list_commits`] returns.
#[derive(Debug, Clone, Copy)]
pub struct CommitFilter {
    pub repository: RepositoryId,
    /// Only commits created on this branch.
    pub branch: Option<BranchId>,
}

/// Commit creation and lookup.
pub struct CommitStore<'a> {
    store: &'a dyn Store,
    short_hash_len: usize,
}

impl<'a> CommitStore<'a> {
    pub fn new(store: &'a dyn Store, short_hash_len: usize) -> Self {
        Self {
            store,
            short_hash_len,
        }
    }

    /// Record a snapshot as a child of `parent`.
    ///
    /// Returns the existing commit when the same content was already
    /// recorded on the same parent.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for an empty message or tag, a parent
    ///   that is unknown, foreign or not earlier, or a branch of another
    ///   repository
    /// - [`EngineError::NotFound`] for an unknown repository or branch
    pub fn create_commit(
        &self,
        repository: RepositoryId,
        branch: BranchId,
        parent: Option<CommitId>,
        draft: CommitDraft,
    ) -> Result<Commit, EngineError> {
        let message = draft.message.trim();
        if message.is_empty() {
            return Err(EngineError::validation("commit message cannot be empty"));
        }
        if draft.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(EngineError::validation("commit tags cannot be empty"));
        }

        self.store.get_repository(repository)?;
        let branch_record = self.store.get_branch(branch)?;
        if branch_record.repository_id != repository {
            return Err(EngineError::validation(format!(
                "branch '{}' belongs to another repository",
                branch_record.name
            )));
        }

        let mut created_at = draft.created_at.unwrap_or_else(UtcTimestamp::now);
        let parent_commit = match parent {
            None => None,
            Some(id) => {
                let p = self.store.get_commit(id).map_err(|_| {
                    EngineError::validation(format!("parent commit {id} does not exist"))
                })?;
                if p.repository_id != repository {
                    return Err(EngineError::validation(format!(
                        "parent commit {id} belongs to another repository"
                    )));
                }
                if p.created_at >= created_at {
                    if draft.created_at.is_some() {
                        return Err(EngineError::validation(format!(
                            "parent commit {id} is not earlier than {created_at}"
                        )));
                    }
                    // Keep the chain strictly ordered under clock jitter.
                    created_at = p.created_at.plus_micros(1);
                }
                Some(p)
            }
        };

        let hash = ContentHash::compute(
            parent_commit.as_ref().map(|p| &p.hash),
            &draft.snapshot.canonical_bytes(),
        );
        let commit = Commit {
            id: CommitId::new(),
            repository_id: repository,
            branch_id: branch,
            parent,
            short_hash: hash.short(self.short_hash_len).to_string(),
            hash,
            message: message.to_string(),
            description: draft.description.filter(|d| !d.trim().is_empty()),
            author: draft.author,
            tags: draft.tags.into_iter().map(|t| t.trim().to_string()).collect(),
            created_at,
        };

        let new_id = commit.id;
        let stored = self.store.insert_commit(commit, draft.snapshot)?;
        if stored.id == new_id {
            tracing::info!(commit = %stored.short_hash, branch = %branch_record.name, "commit created");
        } else {
            tracing::debug!(commit = %stored.short_hash, "identical content already recorded");
        }
        Ok(stored)
    }

    pub fn get_commit(&self, id: CommitId) -> Result<Commit, EngineError> {
        Ok(self.store.get_commit(id)?)
    }

    pub fn get_snapshot(&self, id: CommitId) -> Result<Snapshot, EngineError> {
        Ok(self.store.get_snapshot(id)?)
    }

    /// Find a commit by ID, full hash, or unambiguous hash prefix.
    pub fn resolve(&self, repository: RepositoryId, reference: &str) -> Result<Commit, EngineError> {
        let reference = reference.trim();
        if reference.contains('-') {
            let id = CommitId::parse(reference)?;
            let commit = self.store.get_commit(id)?;
            if commit.repository_id != repository {
                return Err(EngineError::not_found(format!("commit {reference}")));
            }
            return Ok(commit);
        }

        if reference.len() < MIN_PREFIX_LEN || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::validation(format!(
                "'{reference}' is neither a commit id nor a hash prefix of at least {MIN_PREFIX_LEN} hex digits"
            )));
        }
        let prefix = reference.to_ascii_lowercase();
        let mut matches: Vec<Commit> = self
            .store
            .list_commits(repository, None)?
            .into_iter()
            .filter(|c| c.hash.has_prefix(&prefix))
            .collect();
        match matches.len() {
            0 => Err(EngineError::not_found(format!("commit {reference}"))),
            1 => Ok(matches.remove(0)),
            n => Err(EngineError::validation(format!(
                "hash prefix '{reference}' is ambiguous ({n} commits)"
            ))),
        }
    }

    /// A page of commits, newest first, ties broken by ID.
    pub fn list_commits(
        &self,
        filter: CommitFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Commit>, EngineError> {
        Ok(self
            .store
            .list_commits(filter.repository, filter.branch)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Walk a branch from its head back to the root.
    pub fn history(&self, branch: BranchId) -> Result<History<'a>, EngineError> {
        let branch = self.store.get_branch(branch)?;
        Ok(History {
            store: self.store,
            next: branch.head,
            seen: HashSet::new(),
        })
    }
}

/// Lazy walk from a branch head to the root.
///
/// Each step fetches one commit. The walk is finite: a repeated commit
/// yields a corruption error and ends iteration.
pub struct History<'a> {
    store: &'a dyn Store,
    next: Option<CommitId>,
    seen: HashSet<CommitId>,
}

impl Iterator for History<'_> {
    type Item = Result<Commit, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        if !self.seen.insert(id) {
            return Some(Err(EngineError::corrupt(format!(
                "parent cycle through commit {id}"
            ))));
        }
        match self.store.get_commit(id) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok(commit))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::Fixture;
    use crate::engine::ErrorKind;
    use serde_json::json;

    fn snap(value: i64) -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("equipment/AHU-1", json!({ "capacity": value }));
        s
    }

    mod create {
        use super::*;

        #[test]
        fn root_commit() {
            let fx = Fixture::new();
            let commit = fx
                .commits()
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "survey"))
                .unwrap();
            assert!(commit.is_root());
            assert_eq!(commit.short_hash.len(), 7);
            assert!(commit.hash.has_prefix(&commit.short_hash));
        }

        #[test]
        fn hash_depends_on_parent_and_content_only() {
            let fx = Fixture::new();
            let commits = fx.commits();
            let a = commits
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "a"))
                .unwrap();
            let b = commits
                .create_commit(fx.repo.id, fx.main, Some(a.id), fx.draft(snap(1), "b"))
                .unwrap();
            assert_ne!(a.hash, b.hash);
            assert_eq!(
                b.hash,
                ContentHash::compute(Some(&a.hash), &snap(1).canonical_bytes())
            );
        }

        #[test]
        fn identical_content_is_deduplicated() {
            let fx = Fixture::new();
            let commits = fx.commits();
            let first = commits
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "one"))
                .unwrap();
            let second = commits
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "two"))
                .unwrap();
            assert_eq!(first.id, second.id);
            assert_eq!(second.message, "one");
        }

        #[test]
        fn empty_message_rejected() {
            let fx = Fixture::new();
            let err = fx
                .commits()
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "   "))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn unknown_parent_rejected() {
            let fx = Fixture::new();
            let err = fx
                .commits()
                .create_commit(
                    fx.repo.id,
                    fx.main,
                    Some(CommitId::new()),
                    fx.draft(snap(1), "x"),
                )
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn foreign_parent_rejected() {
            let fx = Fixture::new();
            let other = fx.second_repository();
            let foreign = fx
                .commits()
                .create_commit(other.0, other.1, None, fx.draft(snap(1), "elsewhere"))
                .unwrap();
            let err = fx
                .commits()
                .create_commit(fx.repo.id, fx.main, Some(foreign.id), fx.draft(snap(2), "x"))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn foreign_branch_rejected() {
            let fx = Fixture::new();
            let other = fx.second_repository();
            let err = fx
                .commits()
                .create_commit(fx.repo.id, other.1, None, fx.draft(snap(1), "x"))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn backdated_child_rejected() {
            let fx = Fixture::new();
            let commits = fx.commits();
            let parent = commits
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "a"))
                .unwrap();
            let draft = fx.draft(snap(2), "b").at(parent.created_at);
            let err = commits
                .create_commit(fx.repo.id, fx.main, Some(parent.id), draft)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn children_are_strictly_later() {
            let fx = Fixture::new();
            let ids = fx.linear_history(5);
            for pair in ids.windows(2) {
                let parent = fx.commits().get_commit(pair[0]).unwrap();
                let child = fx.commits().get_commit(pair[1]).unwrap();
                assert!(parent.created_at < child.created_at);
            }
        }

        #[test]
        fn tags_and_description_kept() {
            let fx = Fixture::new();
            let draft = fx
                .draft(snap(1), "Replace filters")
                .description("Quarterly maintenance")
                .tag("maintenance")
                .tag("hvac");
            let commit = fx
                .commits()
                .create_commit(fx.repo.id, fx.main, None, draft)
                .unwrap();
            assert_eq!(commit.description.as_deref(), Some("Quarterly maintenance"));
            let tags: Vec<_> = commit.tags.iter().map(String::as_str).collect();
            assert_eq!(tags, ["hvac", "maintenance"]);
        }
    }

    mod read {
        use super::*;

        #[test]
        fn snapshot_round_trips() {
            let fx = Fixture::new();
            let c = fx
                .commits()
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(5), "x"))
                .unwrap();
            assert_eq!(fx.commits().get_snapshot(c.id).unwrap(), snap(5));
        }

        #[test]
        fn resolve_by_id_hash_and_prefix() {
            let fx = Fixture::new();
            let commits = fx.commits();
            let c = commits
                .create_commit(fx.repo.id, fx.main, None, fx.draft(snap(1), "x"))
                .unwrap();
            assert_eq!(commits.resolve(fx.repo.id, &c.id.to_string()).unwrap().id, c.id);
            assert_eq!(commits.resolve(fx.repo.id, c.hash.as_str()).unwrap().id, c.id);
            assert_eq!(commits.resolve(fx.repo.id, &c.short_hash).unwrap().id, c.id);
            assert_eq!(
                commits.resolve(fx.repo.id, "zz").unwrap_err().kind(),
                ErrorKind::Validation
            );
        }

        #[test]
        fn list_is_newest_first_and_paged() {
            let fx = Fixture::new();
            let ids = fx.linear_history(4);
            let filter = CommitFilter {
                repository: fx.repo.id,
                branch: None,
            };
            let page: Vec<_> = fx
                .commits()
                .list_commits(filter, 2, 1)
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect();
            assert_eq!(page, [ids[2], ids[1]]);
        }

        #[test]
        fn history_walks_to_root() {
            let fx = Fixture::new();
            let ids = fx.linear_history(3);
            fx.set_head(fx.main, None, ids[2]);
            let walked: Vec<_> = fx
                .commits()
                .history(fx.main)
                .unwrap()
                .map(|c| c.unwrap().id)
                .collect();
            assert_eq!(walked, [ids[2], ids[1], ids[0]]);
        }

        #[test]
        fn history_of_empty_branch_is_empty() {
            let fx = Fixture::new();
            assert_eq!(fx.commits().history(fx.main).unwrap().count(), 0);
        }
    }
}
