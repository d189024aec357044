//! Strata - Git-like version control for structured building data
//!
//! Strata versions a building's data as snapshots: maps from entity paths
//! (`equipment/AHU-1`, `rooms/101`) to JSON values. Snapshots are recorded
//! as content-addressed commits on branches, compared with structural
//! diffs, and integrated through merges and a pull request review workflow.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Commits, branches, ancestry, merges, review and diffs
//! - [`store`] - Persistence behind a trait with conditional writes
//! - [`core`] - Domain types, record schemas, snapshots and configuration
//! - [`telemetry`] - Logging setup
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. Commits are immutable and identified by the hash of parent and content
//! 2. Branch heads move only through a compare-and-set on the store
//! 3. Pull request state only moves forward; merged and closed are final
//! 4. The default branch is never merged, deleted or retired

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
pub mod telemetry;
pub mod ui;
