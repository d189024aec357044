//! pr command - Pull request workflow

use crate::cli::args::{MergeRights, PrCommand};
use crate::cli::Context;
use crate::core::types::UserId;
use crate::engine::{BranchRef, PrDetails, PullRequestView};
use crate::ui::output;
use anyhow::{Context as _, Result};
use serde_json::json;

pub fn pr(ctx: &Context, action: PrCommand) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let verbosity = ctx.verbosity();

    match action {
        PrCommand::Open {
            source,
            into,
            title,
            description,
            assignee,
            priority,
            kind,
        } => {
            let assignee = assignee
                .map(UserId::new)
                .transpose()
                .context("Invalid assignee")?;
            let pr = engine
                .open_pr(
                    repo.id,
                    &source,
                    into.as_deref(),
                    &title,
                    ctx.author()?,
                    PrDetails {
                        description,
                        assignee,
                        priority,
                        kind,
                    },
                )
                .with_context(|| format!("Failed to open pull request for '{}'", source))?;
            if ctx.json {
                output::json(&pr)?;
            } else {
                output::print(format!("Opened {}", output::format_pr(&pr)), verbosity);
            }
        }
        PrCommand::Approve { number, comment } => {
            let pr = engine
                .approve_pr(repo.id, number, ctx.author()?, comment)
                .with_context(|| format!("Failed to approve #{}", number))?;
            if ctx.json {
                output::json(&pr)?;
            } else {
                output::print(format!("Approved {}", output::format_pr(&pr)), verbosity);
            }
        }
        PrCommand::Merge {
            number,
            message,
            rights,
        } => merge(ctx, number, message.as_deref(), rights)?,
        PrCommand::Close { number, reason } => {
            let actor = ctx.actor(MergeRights::default())?;
            let pr = engine
                .close_pr(repo.id, number, &actor, reason)
                .with_context(|| format!("Failed to close #{}", number))?;
            if ctx.json {
                output::json(&pr)?;
            } else {
                output::print(format!("Closed {}", output::format_pr(&pr)), verbosity);
            }
        }
        PrCommand::Comment { number, body } => {
            let comment = engine
                .add_comment(repo.id, number, ctx.author()?, &body)
                .with_context(|| format!("Failed to comment on #{}", number))?;
            if ctx.json {
                output::json(&comment)?;
            } else {
                output::print(
                    format!("Added comment {} to #{}", comment.seq, number),
                    verbosity,
                );
            }
        }
        PrCommand::Assign { number, user } => {
            let assignee = user.map(UserId::new).transpose().context("Invalid user")?;
            let pr = engine
                .assign_pr(repo.id, number, assignee)
                .with_context(|| format!("Failed to assign #{}", number))?;
            if ctx.json {
                output::json(&pr)?;
            } else {
                let who = pr
                    .assigned_to
                    .as_ref()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "nobody".to_string());
                output::print(format!("#{} assigned to {}", pr.number, who), verbosity);
            }
        }
        PrCommand::Show { number } => {
            let view = engine.describe_pr(repo.id, number)?;
            if ctx.json {
                output::json(&view)?;
            } else {
                print_view(&view);
            }
        }
        PrCommand::List { status, priority } => {
            let mut prs = engine.list_prs(repo.id, status)?;
            if let Some(priority) = priority {
                prs.retain(|pr| pr.priority == priority);
            }
            if ctx.json {
                output::json(&prs)?;
            } else if prs.is_empty() {
                output::print("No pull requests", verbosity);
            } else {
                for pr in &prs {
                    println!("{}", output::format_pr(pr));
                }
            }
        }
    }
    Ok(())
}

fn merge(ctx: &Context, number: u64, message: Option<&str>, rights: MergeRights) -> Result<()> {
    let engine = ctx.engine();
    let repo = ctx.repository(&engine)?;
    let actor = ctx.actor(rights)?;
    let (pr, outcome) = engine
        .merge_pr(repo.id, number, &actor, message)
        .with_context(|| format!("Failed to merge #{}", number))?;

    if ctx.json {
        output::json(&json!({ "pull_request": pr, "merge": outcome }))?;
    } else {
        output::print(
            format!("Merged {} ({})", output::format_pr(&pr), outcome.kind),
            ctx.verbosity(),
        );
    }
    Ok(())
}

fn branch_label(branch: &BranchRef) -> String {
    match branch {
        BranchRef::Live(b) => b.name.to_string(),
        BranchRef::Dangling(id) => format!("(deleted branch {})", id),
    }
}

fn print_view(view: &PullRequestView) {
    let pr = &view.pull_request;
    println!("{}", output::format_pr(pr));
    println!(
        "{} -> {}",
        branch_label(&view.source),
        branch_label(&view.target)
    );
    println!("Author: {}", pr.author);
    println!("Priority: {}", pr.priority);
    if let Some(kind) = pr.kind {
        println!("Type: {}", kind);
    }
    if let Some(user) = &pr.assigned_to {
        println!("Assigned: {}", user);
    }
    if let Some(description) = &pr.description {
        println!();
        println!("{}", description);
    }
    for approval in &pr.approvals {
        match &approval.comment {
            Some(c) => println!("Approved by {}: {}", approval.reviewer, c),
            None => println!("Approved by {}", approval.reviewer),
        }
    }
    for comment in &pr.comments {
        println!("[{}] {}: {}", comment.seq, comment.author, comment.body);
    }
    if let Some(reason) = &pr.close_reason {
        println!("Closed: {}", reason);
    }
}
