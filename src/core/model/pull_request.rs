//! core::model::pull_request
//!
//! Pull request records.
//!
//! # State Machine
//!
//! ```text
//! Open ──approve──▶ Approved ──merge──▶ Merged
//!   │                  │
//!   └──────close───────┴──▶ Closed
//! ```
//!
//! Merged and Closed are terminal. Every write bumps `revision`, which the
//! store uses as the compare-and-set guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::{
    Author, BranchId, CommitId, PullRequestId, RepositoryId, TypeError, UserId, UtcTimestamp,
};

/// Review status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrStatus {
    /// Awaiting review
    Open,
    /// At least one reviewer approved
    Approved,
    /// Integrated into the target branch
    Merged,
    /// Closed without merging
    Closed,
}

impl PrStatus {
    /// Whether no further workflow action is accepted.
    pub fn is_terminal(self) -> bool {
        match self {
            PrStatus::Open | PrStatus::Approved => false,
            PrStatus::Merged | PrStatus::Closed => true,
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrStatus::Open => write!(f, "open"),
            PrStatus::Approved => write!(f, "approved"),
            PrStatus::Merged => write!(f, "merged"),
            PrStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for PrStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PrStatus::Open),
            "approved" => Ok(PrStatus::Approved),
            "merged" => Ok(PrStatus::Merged),
            "closed" => Ok(PrStatus::Closed),
            other => Err(TypeError::InvalidValue(format!(
                "unknown pull request status '{other}'"
            ))),
        }
    }
}

/// How urgently a pull request needs attention.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PrPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    /// Life-safety or outage work
    Emergency,
}

impl fmt::Display for PrPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrPriority::Low => write!(f, "low"),
            PrPriority::Normal => write!(f, "normal"),
            PrPriority::High => write!(f, "high"),
            PrPriority::Urgent => write!(f, "urgent"),
            PrPriority::Emergency => write!(f, "emergency"),
        }
    }
}

impl FromStr for PrPriority {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(PrPriority::Low),
            "normal" => Ok(PrPriority::Normal),
            "high" => Ok(PrPriority::High),
            "urgent" => Ok(PrPriority::Urgent),
            "emergency" => Ok(PrPriority::Emergency),
            other => Err(TypeError::InvalidValue(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

/// What kind of field work a pull request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrKind {
    WorkOrder,
    ContractorWork,
    IssueFix,
}

impl fmt::Display for PrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrKind::WorkOrder => write!(f, "work_order"),
            PrKind::ContractorWork => write!(f, "contractor_work"),
            PrKind::IssueFix => write!(f, "issue_fix"),
        }
    }
}

impl FromStr for PrKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work_order" => Ok(PrKind::WorkOrder),
            "contractor_work" => Ok(PrKind::ContractorWork),
            "issue_fix" => Ok(PrKind::IssueFix),
            other => Err(TypeError::InvalidValue(format!(
                "unknown pull request type '{other}'"
            ))),
        }
    }
}

/// A reviewer's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub reviewer: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub approved_at: UtcTimestamp,
}

/// A discussion comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrComment {
    /// Position in the comment thread, starting at 1.
    pub seq: u64,
    pub author: Author,
    pub body: String,
    pub created_at: UtcTimestamp,
}

/// A request to integrate one branch into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PullRequestId,
    /// Per-repository display number.
    pub number: u64,
    pub repository_id: RepositoryId,
    pub source_branch: BranchId,
    pub target_branch: BranchId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PrStatus,
    #[serde(default)]
    pub priority: PrPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PrKind>,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default)]
    pub comments: Vec<PrComment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_commit: Option<CommitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub revision: u64,
    pub created_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<UtcTimestamp>,
}

impl PullRequest {
    /// Create an open pull request. The store assigns the final `number`.
    pub fn new(
        repository_id: RepositoryId,
        source_branch: BranchId,
        target_branch: BranchId,
        title: String,
        author: Author,
    ) -> Self {
        let now = UtcTimestamp::now();
        Self {
            id: PullRequestId::new(),
            number: 0,
            repository_id,
            source_branch,
            target_branch,
            title,
            description: None,
            status: PrStatus::Open,
            priority: PrPriority::Normal,
            kind: None,
            author,
            assigned_to: None,
            approvals: Vec::new(),
            comments: Vec::new(),
            merge_commit: None,
            close_reason: None,
            revision: 0,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// Whether the pull request still accepts workflow actions.
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether `reviewer` has already approved.
    pub fn approved_by(&self, reviewer: &Author) -> bool {
        self.approvals
            .iter()
            .any(|a| a.reviewer.email == reviewer.email && a.reviewer.id == reviewer.id)
    }

    /// Append a comment, assigning the next sequence number.
    pub fn push_comment(&mut self, author: Author, body: String) -> &PrComment {
        let seq = self.comments.len() as u64 + 1;
        self.comments.push(PrComment {
            seq,
            author,
            body,
            created_at: UtcTimestamp::now(),
        });
        &self.comments[self.comments.len() - 1]
    }

    /// Prepare the record for its next guarded write.
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = UtcTimestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PullRequest {
        PullRequest::new(
            RepositoryId::new(),
            BranchId::new(),
            BranchId::new(),
            "HVAC upgrade floor 3".into(),
            Author::new("Ann", "ann@example.com").unwrap(),
        )
    }

    #[test]
    fn terminal_states() {
        assert!(!PrStatus::Open.is_terminal());
        assert!(!PrStatus::Approved.is_terminal());
        assert!(PrStatus::Merged.is_terminal());
        assert!(PrStatus::Closed.is_terminal());
    }

    #[test]
    fn status_parse_display() {
        for status in [
            PrStatus::Open,
            PrStatus::Approved,
            PrStatus::Merged,
            PrStatus::Closed,
        ] {
            assert_eq!(status.to_string().parse::<PrStatus>().unwrap(), status);
        }
        assert!("draft".parse::<PrStatus>().is_err());
    }

    #[test]
    fn priority_and_kind_parse() {
        assert_eq!("urgent".parse::<PrPriority>().unwrap(), PrPriority::Urgent);
        assert!(PrPriority::Emergency > PrPriority::High);
        assert_eq!(
            "work_order".parse::<PrKind>().unwrap().to_string(),
            "work_order"
        );
        assert!("chore".parse::<PrKind>().is_err());
    }

    #[test]
    fn older_records_default_to_normal_priority() {
        let mut value = serde_json::to_value(sample()).unwrap();
        let record = value.as_object_mut().unwrap();
        record.remove("priority");
        assert!(!record.contains_key("kind"));
        let pr: PullRequest = serde_json::from_value(value).unwrap();
        assert_eq!(pr.priority, PrPriority::Normal);
        assert_eq!(pr.kind, None);
    }

    #[test]
    fn comments_are_numbered() {
        let mut pr = sample();
        let author = Author::new("Bob", "bob@example.com").unwrap();
        assert_eq!(pr.push_comment(author.clone(), "first".into()).seq, 1);
        assert_eq!(pr.push_comment(author, "second".into()).seq, 2);
    }

    #[test]
    fn touch_bumps_revision() {
        let mut pr = sample();
        assert_eq!(pr.revision, 0);
        pr.touch();
        pr.touch();
        assert_eq!(pr.revision, 2);
        assert!(pr.is_live());
    }

    #[test]
    fn approved_by_matches_identity() {
        let mut pr = sample();
        let reviewer = Author::new("Cy", "cy@example.com").unwrap();
        assert!(!pr.approved_by(&reviewer));
        pr.approvals.push(Approval {
            reviewer: reviewer.clone(),
            comment: None,
            approved_at: UtcTimestamp::now(),
        });
        assert!(pr.approved_by(&reviewer));
    }
}
