//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output (text, or JSON with `--json`)
//!
//! Handlers do NOT touch the store directly.

mod branch;
mod commit;
mod completion;
mod config_cmd;
mod diff;
mod init;
mod log_cmd;
mod merge;
mod pr;
mod stale;
mod status;
mod verify;

pub use branch::branch;
pub use commit::commit;
pub use completion::completion;
pub use config_cmd::show as config_show;
pub use diff::diff;
pub use init::init;
pub use log_cmd::log;
pub use merge::merge;
pub use pr::pr;
pub use stale::stale;
pub use status::status;
pub use verify::verify;

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init {
            name,
            default_branch,
            protected,
        } => init(ctx, name.as_deref(), &default_branch, protected),
        Command::Commit {
            file,
            message,
            description,
            tags,
            branch,
        } => commit(
            ctx,
            &file,
            &message,
            description,
            tags,
            branch.as_deref(),
        ),
        Command::Branch(action) => branch(ctx, action),
        Command::Status { branch } => status(ctx, branch.as_deref()),
        Command::Log {
            branch,
            limit,
            offset,
        } => log(ctx, branch.as_deref(), limit, offset),
        Command::Diff { from, to, stat } => diff(ctx, &from, &to, stat),
        Command::Merge {
            source,
            into,
            message,
            rights,
        } => merge(ctx, &source, into.as_deref(), message.as_deref(), rights),
        Command::Pr(action) => pr(ctx, action),
        Command::Stale { days } => stale(ctx, days),
        Command::Verify => verify(ctx),
        Command::Config(ConfigAction::Show) => config_show(ctx),
        Command::Completion { shell } => completion(shell),
    }
}
