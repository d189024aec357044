//! engine::review
//!
//! The pull request review workflow.
//!
//! # State Machine
//!
//! ```text
//! Open ──approve──▶ Approved ──merge──▶ Merged
//!   │                  │
//!   └──────close───────┴──▶ Closed
//! ```
//!
//! Approvals accumulate: the first one moves the request to Approved,
//! later ones are appended. A reviewer counts once; approving again
//! leaves the request unchanged. Merging requires the configured number of
//! approvals and delegates to the [`MergeEngine`].
//!
//! # Guarded Writes
//!
//! Every write carries the revision that was read. If another writer got
//! there first the write fails with [`EngineError::Conflict`]; there is no
//! automatic retry.

use serde::Serialize;

use super::branches::BranchManager;
use super::error::EngineError;
use super::merge::{MergeEngine, MergeOutcome};
use super::{Actor, EngineConfig};
use crate::core::model::{Approval, Branch, PrComment, PrKind, PrPriority, PrStatus, PullRequest};
use crate::core::types::{Author, BranchId, PullRequestId, RepositoryId, UserId, UtcTimestamp};
use crate::store::Store;

/// Input for [`PullRequestWorkflow::open`].
#[derive(Debug, Clone)]
pub struct OpenPullRequest {
    pub repository: RepositoryId,
    pub source: BranchId,
    pub target: BranchId,
    pub title: String,
    pub description: Option<String>,
    pub author: Author,
    pub assignee: Option<UserId>,
    pub priority: PrPriority,
    pub kind: Option<PrKind>,
}

/// Optional attributes of a new pull request.
#[derive(Debug, Clone, Default)]
pub struct PrDetails {
    pub description: Option<String>,
    pub assignee: Option<UserId>,
    pub priority: PrPriority,
    pub kind: Option<PrKind>,
}

/// A branch reference that may outlive its branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "branch", rename_all = "lowercase")]
pub enum BranchRef {
    Live(Branch),
    /// The branch was deleted after the pull request was opened.
    Dangling(BranchId),
}

impl BranchRef {
    pub fn is_dangling(&self) -> bool {
        matches!(self, BranchRef::Dangling(_))
    }
}

/// A pull request with its branch references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestView {
    pub pull_request: PullRequest,
    pub source: BranchRef,
    pub target: BranchRef,
}

/// Review workflow operations.
pub struct PullRequestWorkflow<'a> {
    store: &'a dyn Store,
    config: &'a EngineConfig,
}

impl<'a> PullRequestWorkflow<'a> {
    pub fn new(store: &'a dyn Store, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Apply `change` and write it back, guarded by the read revision.
    fn guarded_write(
        &self,
        mut pr: PullRequest,
        change: impl FnOnce(&mut PullRequest) -> Result<(), EngineError>,
    ) -> Result<PullRequest, EngineError> {
        let expected = pr.revision;
        change(&mut pr)?;
        pr.touch();
        Ok(self.store.update_pull_request(pr, expected)?)
    }

    fn require_live(pr: &PullRequest, action: &str) -> Result<(), EngineError> {
        if pr.status.is_terminal() {
            return Err(EngineError::conflict(format!(
                "cannot {action} pull request #{}: it is {}",
                pr.number, pr.status
            )));
        }
        Ok(())
    }

    /// Open a pull request from `source` into `target`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for an empty title, identical
    ///   branches, or branches of another repository
    /// - [`EngineError::Conflict`] if the source is inactive or a live
    ///   pull request already exists for the pair
    pub fn open(&self, request: OpenPullRequest) -> Result<PullRequest, EngineError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(EngineError::validation("pull request title cannot be empty"));
        }
        if request.source == request.target {
            return Err(EngineError::validation(
                "source and target must be different branches",
            ));
        }

        let branches = BranchManager::new(self.store);
        let source = branches.get_branch_by_id(request.source)?;
        let target = branches.get_branch_by_id(request.target)?;
        for branch in [&source, &target] {
            if branch.repository_id != request.repository {
                return Err(EngineError::validation(format!(
                    "branch '{}' belongs to another repository",
                    branch.name
                )));
            }
        }
        if !source.is_active() {
            return Err(EngineError::conflict(format!(
                "source branch '{}' is {}",
                source.name, source.status
            )));
        }
        if let Some(existing) = self
            .store
            .list_pull_requests(request.repository)?
            .into_iter()
            .find(|pr| pr.is_live() && pr.source_branch == source.id && pr.target_branch == target.id)
        {
            return Err(EngineError::conflict(format!(
                "pull request #{} already proposes '{}' into '{}'",
                existing.number, source.name, target.name
            )));
        }

        let mut pr = PullRequest::new(
            request.repository,
            source.id,
            target.id,
            title.to_string(),
            request.author,
        );
        pr.description = request.description.filter(|d| !d.trim().is_empty());
        pr.assigned_to = request.assignee;
        pr.priority = request.priority;
        pr.kind = request.kind;
        let pr = self.store.insert_pull_request(pr)?;
        tracing::info!(number = pr.number, source = %source.name, target = %target.name, "pull request opened");
        Ok(pr)
    }

    pub fn get(&self, id: PullRequestId) -> Result<PullRequest, EngineError> {
        Ok(self.store.get_pull_request(id)?)
    }

    pub fn get_by_number(
        &self,
        repository: RepositoryId,
        number: u64,
    ) -> Result<PullRequest, EngineError> {
        self.store
            .find_pull_request(repository, number)?
            .ok_or_else(|| EngineError::not_found(format!("pull request #{number}")))
    }

    /// Pull requests of a repository by number, optionally by status.
    pub fn list(
        &self,
        repository: RepositoryId,
        status: Option<PrStatus>,
    ) -> Result<Vec<PullRequest>, EngineError> {
        Ok(self
            .store
            .list_pull_requests(repository)?
            .into_iter()
            .filter(|pr| status.map_or(true, |s| pr.status == s))
            .collect())
    }

    /// Resolve the pull request's branches, marking deleted ones dangling.
    pub fn describe(&self, id: PullRequestId) -> Result<PullRequestView, EngineError> {
        let pr = self.get(id)?;
        let resolve = |branch: BranchId| -> Result<BranchRef, EngineError> {
            match self.store.get_branch(branch) {
                Ok(b) => Ok(BranchRef::Live(b)),
                Err(crate::store::StoreError::NotFound(_)) => Ok(BranchRef::Dangling(branch)),
                Err(e) => Err(e.into()),
            }
        };
        Ok(PullRequestView {
            source: resolve(pr.source_branch)?,
            target: resolve(pr.target_branch)?,
            pull_request: pr,
        })
    }

    /// Record an approval. A repeat approval by the same reviewer returns
    /// the request without writing.
    pub fn approve(
        &self,
        id: PullRequestId,
        reviewer: Author,
        comment: Option<String>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get(id)?;
        Self::require_live(&pr, "approve")?;
        if pr.approved_by(&reviewer) {
            tracing::debug!(number = pr.number, %reviewer, "approval already recorded");
            return Ok(pr);
        }
        let pr = self.guarded_write(pr, |pr| {
            pr.approvals.push(Approval {
                reviewer,
                comment: comment.filter(|c| !c.trim().is_empty()),
                approved_at: UtcTimestamp::now(),
            });
            pr.status = PrStatus::Approved;
            Ok(())
        })?;
        tracing::info!(number = pr.number, approvals = pr.approvals.len(), "pull request approved");
        Ok(pr)
    }

    /// Merge an approved pull request.
    ///
    /// The request is marked merged only after the branch merge succeeds.
    /// If that last write is lost, calling again finishes it with an
    /// up-to-date outcome.
    pub fn merge(
        &self,
        id: PullRequestId,
        actor: &Actor,
        message: Option<&str>,
    ) -> Result<(PullRequest, MergeOutcome), EngineError> {
        let pr = self.get(id)?;
        Self::require_live(&pr, "merge")?;
        if pr.status != PrStatus::Approved {
            return Err(EngineError::conflict(format!(
                "pull request #{} has not been approved",
                pr.number
            )));
        }
        let required = self.config.required_approvals as usize;
        if pr.approvals.len() < required {
            return Err(EngineError::conflict(format!(
                "pull request #{} has {} of {} required approvals",
                pr.number,
                pr.approvals.len(),
                required
            )));
        }

        let default_message = format!("Merge pull request #{}: {}", pr.number, pr.title);
        let message = message.unwrap_or(&default_message);
        let outcome = MergeEngine::new(
            self.store,
            self.config.short_hash_len,
            self.config.merge_retries,
        )
        .merge(pr.source_branch, pr.target_branch, actor, Some(message))?;

        let head = outcome.head;
        let number = pr.number;
        let pr = self
            .guarded_write(pr, |pr| {
                pr.status = PrStatus::Merged;
                pr.merge_commit = Some(head);
                pr.closed_at = Some(UtcTimestamp::now());
                Ok(())
            })
            .inspect_err(|e| {
                tracing::warn!(number, error = %e, "branches merged but pull request update failed");
            })?;
        tracing::info!(number = pr.number, kind = %outcome.kind, "pull request merged");
        Ok((pr, outcome))
    }

    /// Close without merging.
    pub fn close(
        &self,
        id: PullRequestId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get(id)?;
        Self::require_live(&pr, "close")?;
        let pr = self.guarded_write(pr, |pr| {
            pr.status = PrStatus::Closed;
            pr.close_reason = reason.filter(|r| !r.trim().is_empty());
            pr.closed_at = Some(UtcTimestamp::now());
            Ok(())
        })?;
        tracing::info!(number = pr.number, by = %actor.author, "pull request closed");
        Ok(pr)
    }

    pub fn add_comment(
        &self,
        id: PullRequestId,
        author: Author,
        body: &str,
    ) -> Result<PrComment, EngineError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(EngineError::validation("comment cannot be empty"));
        }
        let pr = self.get(id)?;
        Self::require_live(&pr, "comment on")?;
        let mut pr = self.guarded_write(pr, |pr| {
            pr.push_comment(author, body.to_string());
            Ok(())
        })?;
        pr.comments
            .pop()
            .ok_or_else(|| EngineError::corrupt("comment missing after write"))
    }

    /// Set or clear the assigned reviewer.
    pub fn assign(
        &self,
        id: PullRequestId,
        assignee: Option<UserId>,
    ) -> Result<PullRequest, EngineError> {
        let pr = self.get(id)?;
        Self::require_live(&pr, "assign")?;
        self.guarded_write(pr, |pr| {
            pr.assigned_to = assignee;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::branches::BranchOptions;
    use crate::engine::merge::MergeKind;
    use crate::engine::testing::Fixture;
    use crate::engine::ErrorKind;
    use crate::store::FailOn;

    fn reviewer(name: &str) -> Author {
        Author::new(name, format!("{}@example.com", name.to_lowercase())).unwrap()
    }

    /// main at c0, feature with one commit on top.
    fn setup() -> (Fixture, Branch) {
        let fx = Fixture::new();
        let c0 = fx.commit_on(fx.repo.id, fx.main, None, "baseline");
        fx.set_head(fx.main, None, c0);
        let feature = fx
            .branches()
            .create_branch(fx.repo.id, "feature/hvac", Some(c0), BranchOptions::default())
            .unwrap();
        let c1 = fx.commit_on(fx.repo.id, feature.id, Some(c0), "hvac upgrade");
        fx.set_head(feature.id, Some(c0), c1);
        (fx, feature)
    }

    fn open(fx: &Fixture, source: BranchId) -> PullRequest {
        fx.reviews()
            .open(OpenPullRequest {
                repository: fx.repo.id,
                source,
                target: fx.main,
                title: "HVAC upgrade".into(),
                description: None,
                author: fx.actor().author,
                assignee: None,
                priority: PrPriority::Normal,
                kind: None,
            })
            .unwrap()
    }

    mod open {
        use super::*;

        #[test]
        fn numbers_start_at_one() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            assert_eq!(pr.number, 1);
            assert_eq!(pr.status, PrStatus::Open);
        }

        #[test]
        fn duplicate_live_pair_conflicts() {
            let (fx, feature) = setup();
            open(&fx, feature.id);
            let err = fx
                .reviews()
                .open(OpenPullRequest {
                    repository: fx.repo.id,
                    source: feature.id,
                    target: fx.main,
                    title: "again".into(),
                    description: None,
                    author: fx.actor().author,
                    assignee: None,
                    priority: PrPriority::Normal,
                    kind: None,
                })
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }

        #[test]
        fn records_priority_and_kind() {
            let (fx, feature) = setup();
            let pr = fx
                .reviews()
                .open(OpenPullRequest {
                    repository: fx.repo.id,
                    source: feature.id,
                    target: fx.main,
                    title: "Broken outlet in 105".into(),
                    description: None,
                    author: fx.actor().author,
                    assignee: None,
                    priority: PrPriority::Urgent,
                    kind: Some(PrKind::WorkOrder),
                })
                .unwrap();
            let stored = fx.reviews().get(pr.id).unwrap();
            assert_eq!(stored.priority, PrPriority::Urgent);
            assert_eq!(stored.kind, Some(PrKind::WorkOrder));
        }

        #[test]
        fn reopen_allowed_after_close() {
            let (fx, feature) = setup();
            let first = open(&fx, feature.id);
            fx.reviews().close(first.id, &fx.actor(), None).unwrap();
            assert_eq!(open(&fx, feature.id).number, 2);
        }

        #[test]
        fn same_branch_and_empty_title_rejected() {
            let (fx, feature) = setup();
            let base = OpenPullRequest {
                repository: fx.repo.id,
                source: feature.id,
                target: feature.id,
                title: "x".into(),
                description: None,
                author: fx.actor().author,
                assignee: None,
                priority: PrPriority::Normal,
                kind: None,
            };
            assert_eq!(
                fx.reviews().open(base.clone()).unwrap_err().kind(),
                ErrorKind::Validation
            );
            let untitled = OpenPullRequest {
                target: fx.main,
                title: "  ".into(),
                ..base
            };
            assert_eq!(
                fx.reviews().open(untitled).unwrap_err().kind(),
                ErrorKind::Validation
            );
        }

        #[test]
        fn inactive_source_conflicts() {
            let (fx, feature) = setup();
            fx.branches().mark_merged(feature.id).unwrap();
            let err = fx
                .reviews()
                .open(OpenPullRequest {
                    repository: fx.repo.id,
                    source: feature.id,
                    target: fx.main,
                    title: "late".into(),
                    description: None,
                    author: fx.actor().author,
                    assignee: None,
                    priority: PrPriority::Normal,
                    kind: None,
                })
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn approve_then_merge() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            let approved = fx
                .reviews()
                .approve(pr.id, reviewer("Bob"), Some("LGTM".into()))
                .unwrap();
            assert_eq!(approved.status, PrStatus::Approved);

            let (merged, outcome) = fx.reviews().merge(pr.id, &fx.actor(), None).unwrap();
            assert_eq!(outcome.kind, MergeKind::FastForward);
            assert_eq!(merged.status, PrStatus::Merged);
            assert_eq!(merged.merge_commit, Some(outcome.head));
            assert!(merged.closed_at.is_some());
        }

        #[test]
        fn approvals_accumulate() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();
            let pr = fx.reviews().approve(pr.id, reviewer("Cy"), None).unwrap();
            assert_eq!(pr.approvals.len(), 2);
            assert_eq!(pr.status, PrStatus::Approved);

            let again = fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();
            assert_eq!(again.approvals.len(), 2);
            assert_eq!(again.revision, pr.revision);
        }

        #[test]
        fn merge_requires_approval() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            let err = fx.reviews().merge(pr.id, &fx.actor(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert_eq!(fx.reviews().get(pr.id).unwrap().status, PrStatus::Open);
        }

        #[test]
        fn merge_requires_configured_approvals() {
            let (mut fx, feature) = setup();
            fx.config.required_approvals = 2;
            let pr = open(&fx, feature.id);
            fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();
            let err = fx.reviews().merge(pr.id, &fx.actor(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }

        #[test]
        fn failed_merge_leaves_request_approved() {
            let (fx, feature) = setup();
            fx.branches().set_protected(fx.main, true).unwrap();
            let pr = open(&fx, feature.id);
            fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();

            let mut actor = fx.actor();
            actor.may_merge_protected = false;
            let err = fx.reviews().merge(pr.id, &actor, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
            let pr = fx.reviews().get(pr.id).unwrap();
            assert_eq!(pr.status, PrStatus::Approved);
            assert!(pr.merge_commit.is_none());
        }

        #[test]
        fn terminal_states_reject_actions() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.reviews()
                .close(pr.id, &fx.actor(), Some("superseded".into()))
                .unwrap();

            let reviews = fx.reviews();
            let errs = [
                reviews.approve(pr.id, reviewer("Bob"), None).unwrap_err(),
                reviews.merge(pr.id, &fx.actor(), None).unwrap_err(),
                reviews.close(pr.id, &fx.actor(), None).unwrap_err(),
                reviews.add_comment(pr.id, reviewer("Bob"), "hi").unwrap_err(),
                reviews.assign(pr.id, None).unwrap_err(),
            ];
            for err in errs {
                assert_eq!(err.kind(), ErrorKind::Conflict);
            }
            assert_eq!(
                reviews.get(pr.id).unwrap().close_reason.as_deref(),
                Some("superseded")
            );
        }

        #[test]
        fn merged_request_rejects_actions() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();
            fx.reviews().merge(pr.id, &fx.actor(), None).unwrap();

            let reviews = fx.reviews();
            let errs = [
                reviews.approve(pr.id, reviewer("Cy"), None).unwrap_err(),
                reviews.add_comment(pr.id, reviewer("Cy"), "late").unwrap_err(),
                reviews.close(pr.id, &fx.actor(), None).unwrap_err(),
            ];
            for err in errs {
                assert_eq!(err.kind(), ErrorKind::Conflict);
            }
            let pr = reviews.get(pr.id).unwrap();
            assert_eq!(pr.status, PrStatus::Merged);
            assert!(pr.comments.is_empty());
        }

        #[test]
        fn interrupted_merge_can_be_finished() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap();

            fx.store.fail_on(FailOn::PullRequestUpdate { remaining: 1 });
            let err = fx.reviews().merge(pr.id, &fx.actor(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert_eq!(fx.reviews().get(pr.id).unwrap().status, PrStatus::Approved);
            let main_head = fx.branches().get_branch_by_id(fx.main).unwrap().head;

            let (merged, outcome) = fx.reviews().merge(pr.id, &fx.actor(), None).unwrap();
            assert_eq!(outcome.kind, MergeKind::UpToDate);
            assert_eq!(merged.status, PrStatus::Merged);
            assert_eq!(Some(outcome.head), main_head);
            assert_eq!(merged.merge_commit, main_head);
        }

        #[test]
        fn lost_revision_race_conflicts() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.store.fail_on(FailOn::PullRequestUpdate { remaining: 1 });
            let err = fx.reviews().approve(pr.id, reviewer("Bob"), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert_eq!(fx.reviews().get(pr.id).unwrap().status, PrStatus::Open);
        }
    }

    mod discussion {
        use super::*;

        #[test]
        fn comments_numbered_in_order() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            let first = fx.reviews().add_comment(pr.id, reviewer("Bob"), "Check duct sizes").unwrap();
            let second = fx.reviews().add_comment(pr.id, reviewer("Cy"), "Done").unwrap();
            assert_eq!((first.seq, second.seq), (1, 2));
            assert_eq!(fx.reviews().get(pr.id).unwrap().comments.len(), 2);
        }

        #[test]
        fn empty_comment_rejected() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            let err = fx.reviews().add_comment(pr.id, reviewer("Bob"), " ").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[test]
        fn assign_and_clear() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            let user = UserId::new("u-42").unwrap();
            let pr = fx.reviews().assign(pr.id, Some(user.clone())).unwrap();
            assert_eq!(pr.assigned_to, Some(user));
            let pr = fx.reviews().assign(pr.id, None).unwrap();
            assert!(pr.assigned_to.is_none());
        }

        #[test]
        fn deleted_source_is_dangling() {
            let (fx, feature) = setup();
            let pr = open(&fx, feature.id);
            fx.branches().delete_branch(feature.id).unwrap();
            let view = fx.reviews().describe(pr.id).unwrap();
            assert!(view.source.is_dangling());
            assert!(!view.target.is_dangling());
        }

        #[test]
        fn list_filters_by_status() {
            let (fx, feature) = setup();
            let first = open(&fx, feature.id);
            fx.reviews().close(first.id, &fx.actor(), None).unwrap();
            open(&fx, feature.id);

            let reviews = fx.reviews();
            assert_eq!(reviews.list(fx.repo.id, None).unwrap().len(), 2);
            assert_eq!(reviews.list(fx.repo.id, Some(PrStatus::Open)).unwrap().len(), 1);
            assert_eq!(reviews.get_by_number(fx.repo.id, 2).unwrap().status, PrStatus::Open);
            assert_eq!(
                reviews.get_by_number(fx.repo.id, 9).unwrap_err().kind(),
                ErrorKind::NotFound
            );
        }
    }
}
