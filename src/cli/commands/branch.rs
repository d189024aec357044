//! branch command - Create, list, delete and protect branches

use crate::cli::args::BranchCommand;
use crate::cli::Context;
use crate::core::types::CommitId;
use crate::engine::{BranchOptions, Engine};
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn branch(ctx: &Context, action: BranchCommand) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;

    match action {
        BranchCommand::Create {
            name,
            from,
            branch_type,
            protected,
        } => {
            let options = BranchOptions {
                branch_type,
                protected,
            };
            let branch = engine
                .create_branch(repo.id, &name, from.as_deref(), options)
                .with_context(|| format!("Failed to create branch '{}'", name))?;
            if ctx.json {
                output::json(&branch)?;
            } else {
                let at = short_head(&engine, branch.head);
                output::print(
                    format!(
                        "Created branch '{}' at {}",
                        branch.name,
                        at.as_deref().unwrap_or("(empty)")
                    ),
                    ctx.verbosity(),
                );
            }
        }
        BranchCommand::List => {
            let branches = engine.list_branches(repo.id)?;
            if ctx.json {
                output::json(&branches)?;
            } else {
                for branch in &branches {
                    let head = short_head(&engine, branch.head);
                    println!("{}", output::format_branch(branch, head.as_deref()));
                }
            }
        }
        BranchCommand::Delete { name } => {
            let branch = engine
                .delete_branch(repo.id, &name)
                .with_context(|| format!("Failed to delete branch '{}'", name))?;
            if ctx.json {
                output::json(&branch)?;
            } else {
                output::print(format!("Deleted branch '{}'", branch.name), ctx.verbosity());
            }
        }
        BranchCommand::Protect { name, off } => {
            let branch = engine
                .set_protected(repo.id, &name, !off)
                .with_context(|| format!("Failed to update protection of '{}'", name))?;
            if ctx.json {
                output::json(&branch)?;
            } else {
                let state = if branch.protected {
                    "protected"
                } else {
                    "unprotected"
                };
                output::print(format!("Branch '{}' is {}", branch.name, state), ctx.verbosity());
            }
        }
    }
    Ok(())
}

/// Short hash of a head, if the branch has one.
pub(super) fn short_head(engine: &Engine, head: Option<CommitId>) -> Option<String> {
    let id = head?;
    match engine.commits().get_commit(id) {
        Ok(commit) => Some(commit.short_hash),
        Err(e) => {
            tracing::warn!(commit = %id, error = %e, "head commit unreadable");
            None
        }
    }
}
