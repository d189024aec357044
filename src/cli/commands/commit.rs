//! commit command - Record a snapshot file as a commit

use std::fs;
use std::path::Path;

use crate::cli::Context;
use crate::core::snapshot::Snapshot;
use crate::engine::CommitDraft;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Commit the snapshot in `file` on top of a branch.
pub fn commit(
    ctx: &Context,
    file: &Path,
    message: &str,
    description: Option<String>,
    tags: Vec<String>,
    branch: Option<&str>,
) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read snapshot file '{}'", file.display()))?;
    let snapshot = Snapshot::from_json(&raw)
        .with_context(|| format!("'{}' is not a snapshot object", file.display()))?;

    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let branch = match branch {
        Some(name) => name.to_string(),
        None => engine
            .branches()
            .get_default_branch(repo.id)?
            .name
            .to_string(),
    };

    let mut draft = CommitDraft::new(snapshot, message, ctx.author()?);
    if let Some(description) = description {
        draft = draft.description(description);
    }
    for tag in tags {
        draft = draft.tag(tag);
    }

    let commit = engine
        .commit(repo.id, &branch, draft)
        .with_context(|| format!("Failed to commit on '{}'", branch))?;

    if ctx.json {
        output::json(&commit)?;
    } else {
        output::print(
            format!("[{} {}] {}", branch, commit.short_hash, commit.summary()),
            ctx.verbosity(),
        );
    }
    Ok(())
}
