//! core::model::repository
//!
//! The versioned container for one building's data.

use serde::{Deserialize, Serialize};

use crate::core::types::{BranchId, RepositoryId, UtcTimestamp};

/// A building repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    /// Human-readable label, usually the building name.
    pub name: String,
    pub default_branch: BranchId,
    pub created_at: UtcTimestamp,
}

impl Repository {
    pub fn new(name: impl Into<String>, default_branch: BranchId) -> Self {
        Self {
            id: RepositoryId::new(),
            name: name.into(),
            default_branch,
            created_at: UtcTimestamp::now(),
        }
    }
}
