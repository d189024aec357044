//! diff command - Structural diff between two commits

use crate::cli::Context;
use crate::engine::{ChangeKind, DiffSummary};
use crate::ui::output;
use anyhow::{Context as _, Result};
use serde_json::json;

pub fn diff(ctx: &Context, from: &str, to: &str, stat: bool) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;

    let entries = engine
        .diff(repo.id, from, to)
        .with_context(|| format!("Failed to diff '{}' and '{}'", from, to))?;
    let summary = DiffSummary::from_entries(&entries);

    if ctx.json {
        if stat {
            return Ok(output::json(&summary)?);
        }
        return Ok(output::json(&json!({ "summary": summary, "changes": entries }))?);
    }

    if !stat {
        for entry in &entries {
            let line = match entry.kind {
                ChangeKind::Added => format!("+ {} = {}", entry.path, render(&entry.after)),
                ChangeKind::Removed => format!("- {} = {}", entry.path, render(&entry.before)),
                ChangeKind::Modified => format!(
                    "~ {}: {} -> {}",
                    entry.path,
                    render(&entry.before),
                    render(&entry.after)
                ),
            };
            println!("{}", line);
        }
    }
    output::print(summary, ctx.verbosity());
    Ok(())
}

fn render(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}
