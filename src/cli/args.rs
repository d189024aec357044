//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--cwd <path>`: Use this directory as the workspace
//! - `--repo <name>`: Select a repository when the store holds several
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output
//! - `--author-name`, `--author-email`, `--author-id`: Who is acting

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::model::{BranchType, PrKind, PrPriority, PrStatus};

/// Strata - Git-like version control for structured building data
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this directory as the workspace
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Repository to operate on (by name)
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Caller identity. Authentication happens elsewhere; these are trusted.
#[derive(Args, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// Display name of the acting user
    #[arg(long, global = true, env = "STRATA_AUTHOR_NAME")]
    pub author_name: Option<String>,

    /// Email of the acting user
    #[arg(long, global = true, env = "STRATA_AUTHOR_EMAIL")]
    pub author_email: Option<String>,

    /// Stable user id of the acting user
    #[arg(long, global = true, env = "STRATA_AUTHOR_ID")]
    pub author_id: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a repository in the workspace store
    #[command(
        name = "init",
        after_help = "\
EXAMPLES:
    # Repository named after the current directory, default branch 'main'
    strata init

    # Explicit name and a protected default branch
    strata init --name \"HQ Tower\" --protected"
    )]
    Init {
        /// Repository name (defaults to the workspace directory name)
        #[arg(long)]
        name: Option<String>,

        /// Name of the default branch
        #[arg(long, default_value = "main")]
        default_branch: String,

        /// Protect the default branch
        #[arg(long)]
        protected: bool,
    },

    /// Record a snapshot as a new commit
    #[command(
        name = "commit",
        long_about = "Record a snapshot as a new commit.\n\n\
            The snapshot file is a JSON object mapping entity paths to JSON values. \
            The commit is placed on top of the branch head and the head advances. \
            Committing identical content on the same parent returns the existing commit.",
        after_help = "\
EXAMPLES:
    strata commit --file survey.json -m \"Initial survey\"
    strata commit --branch upgrade --file hvac.json -m \"New AHU\" --tag hvac"
    )]
    Commit {
        /// Snapshot JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Branch to commit on (defaults to the default branch)
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Create, list, delete or protect branches
    #[command(subcommand)]
    Branch(BranchCommand),

    /// Show how a branch relates to its base and the default branch
    Status {
        /// Branch (defaults to the default branch)
        branch: Option<String>,
    },

    /// Show commit history
    Log {
        /// Walk this branch's history instead of listing all commits
        #[arg(short, long)]
        branch: Option<String>,

        /// Maximum number of commits
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Commits to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Compare two commits (branch names or commit references)
    Diff {
        from: String,
        to: String,

        /// Only print counts
        #[arg(long)]
        stat: bool,
    },

    /// Merge a branch into another branch
    #[command(
        name = "merge",
        after_help = "\
EXAMPLES:
    # Merge into the default branch
    strata merge upgrade

    # Merge into a protected branch
    strata merge upgrade --into release --allow-protected"
    )]
    Merge {
        /// Branch to merge
        source: String,

        /// Target branch (defaults to the default branch)
        #[arg(long)]
        into: Option<String>,

        /// Merge commit message
        #[arg(short, long)]
        message: Option<String>,

        #[command(flatten)]
        rights: MergeRights,
    },

    /// Pull request workflow
    #[command(subcommand)]
    Pr(PrCommand),

    /// Mark idle branches stale
    Stale {
        /// Idle days before a branch is stale (defaults to config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Check repository invariants
    Verify,

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigAction),

    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Permission to merge into protected branches.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct MergeRights {
    /// Allow merging into a protected branch
    #[arg(long)]
    pub allow_protected: bool,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// Create a branch
    Create {
        name: String,

        /// Starting point: a branch name or commit reference
        #[arg(long)]
        from: Option<String>,

        /// Branch type
        #[arg(long = "type", default_value = "feature")]
        branch_type: BranchType,

        /// Protect the new branch
        #[arg(long)]
        protected: bool,
    },

    /// List branches
    List,

    /// Delete a branch
    Delete { name: String },

    /// Protect or unprotect a branch
    Protect {
        name: String,

        /// Remove protection
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Open a pull request
    Open {
        /// Source branch
        source: String,

        /// Target branch (defaults to the default branch)
        #[arg(long)]
        into: Option<String>,

        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// User id to assign
        #[arg(long)]
        assignee: Option<String>,

        /// low, normal, high, urgent or emergency
        #[arg(long, default_value = "normal")]
        priority: PrPriority,

        /// work_order, contractor_work or issue_fix
        #[arg(long = "type")]
        kind: Option<PrKind>,
    },

    /// Approve a pull request
    Approve {
        number: u64,

        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Merge an approved pull request
    Merge {
        number: u64,

        #[arg(short, long)]
        message: Option<String>,

        #[command(flatten)]
        rights: MergeRights,
    },

    /// Close a pull request without merging
    Close {
        number: u64,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Comment on a pull request
    Comment { number: u64, body: String },

    /// Assign a pull request (omit the user to unassign)
    Assign { number: u64, user: Option<String> },

    /// Show one pull request
    Show { number: u64 },

    /// List pull requests
    List {
        #[arg(long)]
        status: Option<PrStatus>,

        #[arg(long)]
        priority: Option<PrPriority>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved configuration and where it came from
    Show,
}

/// Shell types for completion generation.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_branch_create() {
        let cli = Cli::try_parse_from([
            "strata", "branch", "create", "upgrade", "--from", "main", "--type", "maintenance",
        ])
        .unwrap();
        match cli.command {
            Command::Branch(BranchCommand::Create {
                name,
                from,
                branch_type,
                protected,
            }) => {
                assert_eq!(name, "upgrade");
                assert_eq!(from.as_deref(), Some("main"));
                assert_eq!(branch_type, BranchType::Maintenance);
                assert!(!protected);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "verify", "--json", "--repo", "HQ"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.repo.as_deref(), Some("HQ"));
    }

    #[test]
    fn pr_list_status_filter() {
        let cli = Cli::try_parse_from(["strata", "pr", "list", "--status", "approved"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pr(PrCommand::List {
                status: Some(PrStatus::Approved),
                priority: None,
            })
        ));
    }

    #[test]
    fn pr_open_priority_and_type() {
        let cli = Cli::try_parse_from([
            "strata", "pr", "open", "fix/outlet", "-t", "Outlet", "--priority", "urgent", "--type",
            "work_order",
        ])
        .unwrap();
        match cli.command {
            Command::Pr(PrCommand::Open { priority, kind, .. }) => {
                assert_eq!(priority, PrPriority::Urgent);
                assert_eq!(kind, Some(PrKind::WorkOrder));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["strata", "pr", "open", "x", "-t", "X"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pr(PrCommand::Open {
                priority: PrPriority::Normal,
                kind: None,
                ..
            })
        ));
    }
}
