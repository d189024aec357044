//! core::model
//!
//! Persisted record types.
//!
//! # Modules
//!
//! - [`branch`] - Branches, their status and type
//! - [`commit`] - Immutable commits
//! - [`pull_request`] - Pull requests, approvals and comments
//! - [`repository`] - The per-building repository record
//!
//! # Schema Design
//!
//! - Status fields are closed enums, never free-form strings
//! - Records reference each other by ID, never by containment
//! - Every record round-trips through JSON with stable lowercase tags

pub mod branch;
pub mod commit;
pub mod pull_request;
pub mod repository;

pub use branch::{Branch, BranchStatus, BranchType};
pub use commit::Commit;
pub use pull_request::{Approval, PrComment, PrKind, PrPriority, PrStatus, PullRequest};
pub use repository::Repository;
