//! log command - Show commit history
//!
//! With `--branch`, walks the branch from its head to the root. Without it,
//! lists every commit of the repository newest first.

use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn log(ctx: &Context, branch: Option<&str>, limit: usize, offset: usize) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;

    let commits = engine
        .log(repo.id, branch, limit, offset)
        .context("Failed to read history")?;

    if ctx.json {
        return Ok(output::json(&commits)?);
    }
    if commits.is_empty() {
        output::print("No commits", ctx.verbosity());
        return Ok(());
    }
    for commit in &commits {
        println!("{}", output::format_commit(commit));
    }
    Ok(())
}
