//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;

use serde::Serialize;

use crate::core::model::{Branch, Commit, PrPriority, PullRequest};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON (always shown).
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line commit summary: `<short> <summary> (<author>, <time>)`.
pub fn format_commit(commit: &Commit) -> String {
    let tags = if commit.tags.is_empty() {
        String::new()
    } else {
        let joined: Vec<&str> = commit.tags.iter().map(String::as_str).collect();
        format!(" [{}]", joined.join(", "))
    };
    format!(
        "{} {}{} ({}, {})",
        commit.short_hash,
        commit.summary(),
        tags,
        commit.author.name,
        commit.created_at
    )
}

/// One-line branch summary with markers for default and protected.
pub fn format_branch(branch: &Branch, short_head: Option<&str>) -> String {
    let marker = if branch.is_default { "* " } else { "  " };
    let mut line = format!("{}{}", marker, branch.name);
    line.push_str(&format!(" [{}, {}]", branch.branch_type, branch.status));
    if branch.protected {
        line.push_str(" (protected)");
    }
    match short_head {
        Some(head) => line.push_str(&format!(" {}", head)),
        None => line.push_str(" (no commits)"),
    }
    line
}

/// One-line pull request summary: `#<n> [<status>] <title>`.
///
/// Priorities other than normal and the type join the status tag.
pub fn format_pr(pr: &PullRequest) -> String {
    let mut tag = pr.status.to_string();
    if pr.priority != PrPriority::Normal {
        tag.push_str(&format!(", {}", pr.priority));
    }
    if let Some(kind) = pr.kind {
        tag.push_str(&format!(", {kind}"));
    }
    let mut line = format!("#{} [{}] {}", pr.number, tag, pr.title);
    if !pr.approvals.is_empty() {
        line.push_str(&format!(" ({} approval", pr.approvals.len()));
        if pr.approvals.len() != 1 {
            line.push('s');
        }
        line.push(')');
    }
    line
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
