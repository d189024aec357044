//! init command - Create a repository in the workspace store

use crate::cli::Context;
use crate::ui::output;
use anyhow::{bail, Context as _, Result};
use serde_json::json;

/// Create a repository and its default branch.
///
/// The name defaults to the workspace directory name. A store may hold
/// several repositories, but names must be unique within it.
pub fn init(ctx: &Context, name: Option<&str>, default_branch: &str, protected: bool) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => ctx
            .workspace
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string()),
    };

    let engine = ctx.engine();
    let existing = engine.list_repositories().context("Failed to read store")?;
    if existing.iter().any(|r| r.name == name) {
        bail!("Repository '{}' already exists in this workspace", name);
    }

    let (repo, branch) = engine
        .init_repository(&name, default_branch, protected)
        .context("Failed to initialize repository")?;

    if ctx.json {
        output::json(&json!({ "repository": repo, "default_branch": branch }))?;
    } else {
        output::print(
            format!(
                "Initialized repository '{}' with default branch '{}'{}",
                repo.name,
                branch.name,
                if branch.protected { " (protected)" } else { "" }
            ),
            ctx.verbosity(),
        );
    }
    Ok(())
}
