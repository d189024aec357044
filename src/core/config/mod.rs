//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Strata has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Workspace-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$STRATA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/strata/config.toml`
//! 3. `~/.strata/config.toml`
//!
//! # Project Config Location
//!
//! `<workspace>/.strata/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use strata::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/srv/buildings/hq"))).unwrap();
//! let config = result.config;
//! println!("short hashes: {} chars", config.short_hash_len());
//! println!("approvals needed: {}", config.required_approvals());
//! ```

pub mod schema;

pub use schema::{ConfigFile, LogFormat};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding per-workspace state.
pub const WORKSPACE_DIR: &str = ".strata";

pub const DEFAULT_SHORT_HASH_LEN: usize = 7;
pub const DEFAULT_MERGE_RETRIES: u32 = 1;
pub const DEFAULT_STALE_AFTER_DAYS: u32 = 30;
pub const DEFAULT_REQUIRED_APPROVALS: u32 = 1;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: project over global over defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub project: Option<ConfigFile>,
    workspace: Option<PathBuf>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `workspace` is provided, also loads the project config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing files are not an error.
    pub fn load(workspace: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), workspace)
    }

    /// Load configuration from an explicit global file and workspace.
    pub fn load_from(
        global_path: Option<&Path>,
        workspace: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let global = match global_path {
            Some(path) => Self::read_config(path)?,
            None => ConfigFile::default(),
        };

        let (project, project_path) = match workspace {
            Some(ws) => {
                let path = Self::project_config_path(ws);
                if path.exists() {
                    (Some(Self::read_config(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
            if p.store.as_ref().and_then(|s| s.path.as_ref()).is_some()
                && global.store.as_ref().and_then(|s| s.path.as_ref()).is_some()
            {
                if let Some(path) = &project_path {
                    warnings.push(ConfigWarning {
                        message: "store.path set in both global and project config; \
                                  the project value wins"
                            .to_string(),
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                workspace: workspace.map(Path::to_path_buf),
                global_path: global_path.map(Path::to_path_buf),
                project_path,
            },
            warnings,
        })
    }

    /// Locate the global config file, if any.
    fn find_global() -> Option<PathBuf> {
        // 1. $STRATA_CONFIG
        if let Ok(path) = std::env::var("STRATA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. $XDG_CONFIG_HOME/strata/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("strata/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. ~/.strata/config.toml
        dirs::home_dir()
            .map(|home| home.join(".strata/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the project config for a workspace.
    pub fn project_config_path(workspace: &Path) -> PathBuf {
        workspace.join(WORKSPACE_DIR).join("config.toml")
    }

    /// Default store location for a workspace.
    pub fn default_store_path(workspace: &Path) -> PathBuf {
        workspace.join(WORKSPACE_DIR).join("store.json")
    }

    /// Pick the first value set, project before global.
    fn lookup<T>(&self, get: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.project.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Resolved store path.
    ///
    /// Relative paths resolve against the workspace. Without a configured
    /// path the store lives in the workspace directory.
    pub fn store_path(&self, workspace: &Path) -> PathBuf {
        match self.lookup(|c| c.store.as_ref().and_then(|s| s.path.clone())) {
            Some(path) if path.is_absolute() => path,
            Some(path) => workspace.join(path),
            None => Self::default_store_path(workspace),
        }
    }

    pub fn short_hash_len(&self) -> usize {
        self.lookup(|c| c.commits.as_ref().and_then(|s| s.short_hash_len))
            .unwrap_or(DEFAULT_SHORT_HASH_LEN)
    }

    pub fn merge_retries(&self) -> u32 {
        self.lookup(|c| c.merge.as_ref().and_then(|s| s.retries))
            .unwrap_or(DEFAULT_MERGE_RETRIES)
    }

    pub fn stale_after_days(&self) -> u32 {
        self.lookup(|c| c.branches.as_ref().and_then(|s| s.stale_after_days))
            .unwrap_or(DEFAULT_STALE_AFTER_DAYS)
    }

    pub fn required_approvals(&self) -> u32 {
        self.lookup(|c| c.review.as_ref().and_then(|s| s.required_approvals))
            .unwrap_or(DEFAULT_REQUIRED_APPROVALS)
    }

    pub fn log_level(&self) -> String {
        self.lookup(|c| c.log.as_ref().and_then(|s| s.level.clone()))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn log_format(&self) -> LogFormat {
        self.lookup(|c| c.log.as_ref().and_then(|s| s.format))
            .unwrap_or_default()
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}
