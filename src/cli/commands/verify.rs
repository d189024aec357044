//! verify command - Check repository invariants
//!
//! Exits non-zero when any issue is found.

use crate::cli::Context;
use crate::ui::output;
use anyhow::{bail, Context as _, Result};

pub fn verify(ctx: &Context) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let report = engine.verify(repo.id).context("Verification failed to run")?;

    if ctx.json {
        output::json(&report)?;
    } else {
        output::print(
            format!(
                "Checked {} branch(es) and {} commit(s) in '{}'",
                report.branches_checked, report.commits_checked, repo.name
            ),
            ctx.verbosity(),
        );
        for issue in &report.issues {
            println!("  {}", issue);
        }
    }

    if !report.is_ok() {
        bail!("{} issue(s) found", report.issues.len());
    }
    if !ctx.json {
        output::print("No issues found", ctx.verbosity());
    }
    Ok(())
}
