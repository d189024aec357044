//! status command - Show ahead/behind for a branch

use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn status(ctx: &Context, branch: Option<&str>) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let name = match branch {
        Some(name) => name.to_string(),
        None => engine
            .branches()
            .get_default_branch(repo.id)?
            .name
            .to_string(),
    };

    let report = engine
        .status(repo.id, &name)
        .with_context(|| format!("Failed to compute status of '{}'", name))?;

    if ctx.json {
        return Ok(output::json(&report)?);
    }

    let b = &report.branch;
    println!("On branch {} [{}, {}]", b.name, b.branch_type, b.status);
    if b.protected {
        println!("Protected");
    }
    match &report.head {
        Some(head) => println!("Head: {}", output::format_commit(head)),
        None => println!("No commits yet"),
    }
    if !b.is_default {
        print!("{} commit(s) ahead of base", report.ahead.count);
        if !report.ahead.base_reached {
            print!(" (head no longer descends from base)");
        }
        println!();
        println!("{} commit(s) behind '{}'", report.behind, report.upstream);
    }
    if !report.open_pull_requests.is_empty() {
        let numbers: Vec<String> = report
            .open_pull_requests
            .iter()
            .map(|n| format!("#{n}"))
            .collect();
        println!("Open pull requests: {}", numbers.join(", "));
    }
    Ok(())
}
