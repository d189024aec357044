//! merge command - Merge one branch into another

use crate::cli::args::MergeRights;
use crate::cli::Context;
use crate::engine::{MergeKind, MergeOutcome};
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn merge(
    ctx: &Context,
    source: &str,
    into: Option<&str>,
    message: Option<&str>,
    rights: MergeRights,
) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let actor = ctx.actor(rights)?;

    let outcome = engine
        .merge(repo.id, source, into, &actor, message)
        .with_context(|| format!("Failed to merge '{}'", source))?;

    if ctx.json {
        return Ok(output::json(&outcome)?);
    }
    let target = engine.branches().get_branch_by_id(outcome.target)?;
    output::print(describe(&outcome, source, target.name.as_str()), ctx.verbosity());
    if outcome.retries_used > 0 {
        output::warn(
            format!("target moved during merge; retried {} time(s)", outcome.retries_used),
            ctx.verbosity(),
        );
    }
    Ok(())
}

/// Human summary of a merge outcome.
pub(super) fn describe(outcome: &MergeOutcome, source: &str, target: &str) -> String {
    let mut line = match outcome.kind {
        MergeKind::FastForward => format!("Fast-forwarded '{}' to '{}'", target, source),
        MergeKind::MergeCommit => format!("Merged '{}' into '{}' with a merge commit", source, target),
        MergeKind::UpToDate => format!("'{}' already contains '{}'", target, source),
    };
    if outcome.source_marked_merged {
        line.push_str(&format!("; '{}' marked merged", source));
    }
    line
}
