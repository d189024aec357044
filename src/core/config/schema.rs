//! core::config::schema
//!
//! Configuration schema types.
//!
//! The global and project files share one schema. Every field is optional so
//! a project file can override a single key without restating the rest.
//!
//! # Example
//!
//! ```toml
//! [store]
//! path = ".strata/store.json"
//!
//! [commits]
//! short_hash_len = 10
//!
//! [merge]
//! retries = 2
//!
//! [branches]
//! stale_after_days = 45
//!
//! [review]
//! required_approvals = 2
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing. Unknown keys are rejected by serde.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Bounds for the abbreviated commit hash.
pub const SHORT_HASH_MIN: usize = 4;
pub const SHORT_HASH_MAX: usize = 64;

/// Levels accepted by `log.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Contents of one configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub store: Option<StoreSection>,
    pub commits: Option<CommitsSection>,
    pub merge: Option<MergeSection>,
    pub branches: Option<BranchesSection>,
    pub review: Option<ReviewSection>,
    pub log: Option<LogSection>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(len) = self.commits.as_ref().and_then(|c| c.short_hash_len) {
            if !(SHORT_HASH_MIN..=SHORT_HASH_MAX).contains(&len) {
                return Err(ConfigError::InvalidValue(format!(
                    "commits.short_hash_len must be between {} and {}, got {}",
                    SHORT_HASH_MIN, SHORT_HASH_MAX, len
                )));
            }
        }

        if let Some(days) = self.branches.as_ref().and_then(|b| b.stale_after_days) {
            if days == 0 {
                return Err(ConfigError::InvalidValue(
                    "branches.stale_after_days must be at least 1".to_string(),
                ));
            }
        }

        if let Some(n) = self.review.as_ref().and_then(|r| r.required_approvals) {
            if n == 0 {
                return Err(ConfigError::InvalidValue(
                    "review.required_approvals must be at least 1".to_string(),
                ));
            }
        }

        if let Some(level) = self.log.as_ref().and_then(|l| l.level.as_deref()) {
            if !VALID_LOG_LEVELS.contains(&level) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log.level '{}', must be one of: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                )));
            }
        }

        if let Some(path) = self.store.as_ref().and_then(|s| s.path.as_ref()) {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "store.path cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Location of the store document. Relative paths resolve against the
    /// workspace root.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CommitsSection {
    pub short_hash_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MergeSection {
    /// Extra attempts after a lost head race.
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BranchesSection {
    pub stale_after_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewSection {
    pub required_approvals: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}
