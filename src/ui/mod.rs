//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! All command output goes through this module so quiet and JSON modes are
//! handled in one place.

pub mod output;
