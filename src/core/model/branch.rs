//! core::model::branch
//!
//! Branch records.
//!
//! # State Machine
//!
//! ```text
//! Active ──merge──▶ Merged
//!    │
//!    └──inactivity──▶ Stale
//! ```
//!
//! Merged and Stale are terminal for writes: the branch stays readable but
//! its head can no longer move.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId, TypeError, UtcTimestamp};

/// Lifecycle status of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    /// Open for commits and head updates
    Active,
    /// Integrated into another branch
    Merged,
    /// Retired by the inactivity policy
    Stale,
}

impl BranchStatus {
    /// Whether the branch head may still move.
    pub fn is_writable(self) -> bool {
        match self {
            BranchStatus::Active => true,
            BranchStatus::Merged | BranchStatus::Stale => false,
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchStatus::Active => write!(f, "active"),
            BranchStatus::Merged => write!(f, "merged"),
            BranchStatus::Stale => write!(f, "stale"),
        }
    }
}

/// What a branch is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchType {
    /// The repository's default branch
    Default,
    /// General proposed change
    #[default]
    Feature,
    /// Maintenance or work-order change
    Maintenance,
    /// External contractor project
    Contractor,
    /// Release or handover snapshot
    Release,
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BranchType::Default => "default",
            BranchType::Feature => "feature",
            BranchType::Maintenance => "maintenance",
            BranchType::Contractor => "contractor",
            BranchType::Release => "release",
        };
        f.write_str(s)
    }
}

impl FromStr for BranchType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(BranchType::Default),
            "feature" => Ok(BranchType::Feature),
            "maintenance" => Ok(BranchType::Maintenance),
            "contractor" => Ok(BranchType::Contractor),
            "release" => Ok(BranchType::Release),
            other => Err(TypeError::InvalidValue(format!(
                "unknown branch type '{other}'"
            ))),
        }
    }
}

/// A branch of a building repository.
///
/// Branches point at commits by ID; they never own them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub repository_id: RepositoryId,
    pub name: BranchName,
    pub status: BranchStatus,
    pub branch_type: BranchType,
    /// Protected branches only accept fast-forward head updates and reject
    /// status transitions.
    pub protected: bool,
    pub is_default: bool,
    /// Absent only before the first commit.
    pub head: Option<CommitId>,
    /// The commit the branch diverged from.
    pub base: Option<CommitId>,
    pub created_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
}

impl Branch {
    /// Create a new active branch whose head starts at its base.
    pub fn new(
        repository_id: RepositoryId,
        name: BranchName,
        base: Option<CommitId>,
        branch_type: BranchType,
        protected: bool,
    ) -> Self {
        let now = UtcTimestamp::now();
        Self {
            id: BranchId::new(),
            repository_id,
            name,
            status: BranchStatus::Active,
            branch_type,
            protected,
            is_default: false,
            head: base,
            base,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the default branch of a fresh repository.
    pub fn new_default(repository_id: RepositoryId, name: BranchName, protected: bool) -> Self {
        Self {
            is_default: true,
            ..Self::new(repository_id, name, None, BranchType::Default, protected)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BranchStatus::Active
    }

    /// Whether the head still sits at the divergence point.
    pub fn is_unchanged(&self) -> bool {
        self.head == self.base
    }
}
