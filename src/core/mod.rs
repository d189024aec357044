//! core
//!
//! Core domain types and schemas for Strata.
//!
//! # Modules
//!
//! - [`types`] - Strong types: IDs, BranchName, ContentHash, Author
//! - [`snapshot`] - Entity snapshots and their canonical bytes
//! - [`model`] - Persisted records: repositories, branches, commits, PRs
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Hashing is deterministic

pub mod config;
pub mod model;
pub mod snapshot;
pub mod types;
