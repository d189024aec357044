//! cli
//!
//! Command-line interface for Strata.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and initialize logging
//! - Resolve the workspace store, repository and caller identity
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] facade. All repository state changes flow through the
//! engine over a [`FileStore`] in the workspace.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::core::config::Config;
use crate::core::model::Repository;
use crate::core::types::{Author, UserId};
use crate::engine::{Actor, Engine, EngineConfig, EngineError, ErrorKind};
use crate::store::FileStore;
use crate::telemetry;
use crate::ui::output::{self, Verbosity};
use args::{IdentityArgs, MergeRights};

/// Per-invocation settings shared by all command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub repo: Option<String>,
    pub debug: bool,
    pub quiet: bool,
    pub json: bool,
    pub identity: IdentityArgs,
    pub config: Config,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// Engine over the workspace store.
    pub fn engine(&self) -> Engine {
        let path = self.config.store_path(&self.workspace);
        tracing::debug!(store = %path.display(), "opening store");
        Engine::new(
            Arc::new(FileStore::open(path)),
            EngineConfig::from(&self.config),
        )
    }

    /// The repository selected by `--repo`, or the only one in the store.
    pub fn repository(&self, engine: &Engine) -> Result<Repository> {
        if let Some(name) = &self.repo {
            return Ok(engine.find_repository(name)?);
        }
        let mut repos = engine.list_repositories().context("Failed to read store")?;
        match repos.len() {
            0 => bail!("No repository in this workspace. Run 'strata init' first."),
            1 => Ok(repos.remove(0)),
            _ => {
                let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
                bail!(
                    "Workspace holds several repositories ({}); pick one with --repo",
                    names.join(", ")
                )
            }
        }
    }

    /// The acting user from flags or environment.
    pub fn author(&self) -> Result<Author> {
        let (Some(name), Some(email)) = (&self.identity.author_name, &self.identity.author_email)
        else {
            bail!(
                "Author identity required: pass --author-name and --author-email \
                 or set STRATA_AUTHOR_NAME and STRATA_AUTHOR_EMAIL"
            );
        };
        let author = Author::new(name.as_str(), email.as_str()).context("Invalid author")?;
        match &self.identity.author_id {
            Some(id) => Ok(author.with_id(UserId::new(id.as_str()).context("Invalid author id")?)),
            None => Ok(author),
        }
    }

    pub fn actor(&self, rights: MergeRights) -> Result<Actor> {
        Ok(Actor::new(self.author()?).with_merge_rights(rights.allow_protected))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let workspace = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let loaded = Config::load(Some(&workspace)).context("Failed to load config")?;
    let config = loaded.config;
    telemetry::init(&config.log_level(), config.log_format(), cli.debug);

    let ctx = Context {
        workspace,
        repo: cli.repo.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        json: cli.json,
        identity: cli.identity.clone(),
        config,
    };
    for warning in loaded.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            ctx.verbosity(),
        );
    }

    commands::dispatch(cli.command, &ctx)
}

/// Process exit code for an error.
///
/// Engine errors map to one code per kind so scripts can tell a lost race
/// from bad input.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|e| e.downcast_ref::<EngineError>())
        .map(EngineError::kind);
    match kind {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Forbidden) => 5,
        Some(ErrorKind::Store) => 6,
        None => 1,
    }
}
