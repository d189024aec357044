//! engine::ancestry
//!
//! Parent-chain traversal over the commit graph.
//!
//! # Design
//!
//! Every commit has at most one parent, so ancestry is a chain. Walks fetch
//! one record at a time by ID from the store and are recomputed per call;
//! nothing is cached between calls.
//!
//! # Invariants
//!
//! - Walks terminate: a commit seen twice means the stored history is
//!   corrupt, and the walk reports that instead of looping
//! - Every walk is O(depth)

use std::collections::HashSet;

use serde::Serialize;

use super::error::EngineError;
use crate::core::model::Branch;
use crate::core::types::CommitId;
use crate::store::Store;

/// How far a branch has moved past its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ahead {
    /// Commits reachable from the head but not from the base.
    pub count: usize,
    /// False when the walk hit the root without meeting the base, meaning
    /// the head no longer descends from it.
    pub base_reached: bool,
}

/// Walks commit ancestry.
pub struct AncestryWalker<'a> {
    store: &'a dyn Store,
}

/// Iterator over a parent chain, starting commit first.
struct Chain<'a> {
    store: &'a dyn Store,
    next: Option<CommitId>,
    seen: HashSet<CommitId>,
}

impl Iterator for Chain<'_> {
    type Item = Result<CommitId, EngineError>;

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
                Some(Ok(id))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

impl<'a> AncestryWalker<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn chain(&self, start: Option<CommitId>) -> Chain<'a> {
        Chain {
            store: self.store,
            next: start,
            seen: HashSet::new(),
        }
    }

    /// The commit and all its ancestors, nearest first.
    pub fn ancestors(&self, start: CommitId) -> Result<Vec<CommitId>, EngineError> {
        self.chain(Some(start)).collect()
    }

    /// Whether `ancestor` is `descendant` or one of its ancestors.
    pub fn is_ancestor(
        &self,
        ancestor: CommitId,
        descendant: CommitId,
    ) -> Result<bool, EngineError> {
        for id in self.chain(Some(descendant)) {
            if id? == ancestor {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Count the commits on `branch` since its base.
    pub fn commits_ahead(&self, branch: &Branch) -> Result<Ahead, EngineError> {
        let mut count = 0;
        for id in self.chain(branch.head) {
            if Some(id?) == branch.base {
                return Ok(Ahead {
                    count,
                    base_reached: true,
                });
            }
            count += 1;
        }
        Ok(Ahead {
            count,
            base_reached: branch.base.is_none(),
        })
    }

    /// Count commits on `upstream` that `branch` has not incorporated.
    ///
    /// A branch incorporates everything reachable from its base or its
    /// head. The walk stops at the first incorporated commit because that
    /// set is closed under ancestry.
    pub fn commits_behind(&self, branch: &Branch, upstream: &Branch) -> Result<usize, EngineError> {
        if branch.id == upstream.id {
            return Ok(0);
        }

        let mut incorporated = HashSet::new();
        for start in [branch.base, branch.head].into_iter().flatten() {
            for id in self.chain(Some(start)) {
                if !incorporated.insert(id?) {
                    break;
                }
            }
        }

        let mut behind = 0;
        for id in self.chain(upstream.head) {
            if incorporated.contains(&id?) {
                break;
            }
            behind += 1;
        }
        tracing::debug!(
            branch = %branch.name,
            upstream = %upstream.name,
            behind,
            "computed commits behind"
        );
        Ok(behind)
    }

    /// The nearest commit shared by both histories.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when the histories are disjoint.
    pub fn common_ancestor(&self, a: CommitId, b: CommitId) -> Result<CommitId, EngineError> {
        let ours: HashSet<CommitId> = self.ancestors(a)?.into_iter().collect();
        for id in self.chain(Some(b)) {
            let id = id?;
            if ours.contains(&id) {
                return Ok(id);
            }
        }
        Err(EngineError::not_found(format!(
            "no common ancestor between {a} and {b}"
        )))
    }
}
