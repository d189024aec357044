//! stale command - Mark idle branches stale

use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};
use chrono::Duration;

pub fn stale(ctx: &Context, days: Option<u32>) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let threshold = days.map(|d| Duration::days(i64::from(d)));

    let swept = engine
        .sweep_stale(repo.id, threshold)
        .context("Failed to sweep stale branches")?;

    if ctx.json {
        return Ok(output::json(&swept)?);
    }
    if swept.is_empty() {
        output::print("No stale branches", ctx.verbosity());
    } else {
        for branch in &swept {
            output::print(format!("Marked '{}' stale", branch.name), ctx.verbosity());
        }
    }
    Ok(())
}
