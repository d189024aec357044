//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`RepositoryId`], [`BranchId`], [`CommitId`], [`PullRequestId`] - Record identifiers
//! - [`BranchName`] - Validated branch name
//! - [`ContentHash`] - Content address of a commit
//! - [`UserId`] - Externally resolved user identity
//! - [`Author`] - Who wrote a commit or review action
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use strata::core::types::{BranchName, ContentHash};
//!
//! let branch = BranchName::new("contractor/hvac-floor-3").unwrap();
//! assert_eq!(branch.as_str(), "contractor/hvac-floor-3");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(ContentHash::new("not-a-hash").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("invalid author: {0}")]
    InvalidAuthor(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an identifier from its hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, TypeError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| TypeError::InvalidId(format!("{} id '{}'", $label, s)))
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a building repository.
    RepositoryId,
    "repository"
);
record_id!(
    /// Identifier of a branch.
    BranchId,
    "branch"
);
record_id!(
    /// Identifier of a commit.
    ///
    /// Commit identity is separate from its [`ContentHash`]; deduplication
    /// works by looking up an existing commit with the same parent and hash.
    CommitId,
    "commit"
);
record_id!(
    /// Identifier of a pull request.
    PullRequestId,
    "pull request"
);

/// A validated branch name.
///
/// Branch names follow git's refname rules so they stay displayable and
/// unambiguous in paths and URLs:
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`, or end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, whitespace, control characters,
///   or any of `~ ^ : \ ? * [`
/// - No path component may start with `.` or end with `.lock`
///
/// # Example
///
/// ```
/// use strata::core::types::BranchName;
///
/// let name = BranchName::new("maintenance/chiller-2").unwrap();
/// assert_eq!(name.to_string(), "maintenance/chiller-2");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    const FORBIDDEN_CHARS: [char; 7] = ['~', '^', ':', '\\', '?', '*', '['];
    const FORBIDDEN_SEQUENCES: [&'static str; 3] = ["..", "@{", "//"];

    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |why: String| Err(TypeError::InvalidBranchName(why));

        if name.is_empty() {
            return reject("branch name cannot be empty".into());
        }
        if name == "@" {
            return reject("branch name cannot be '@'".into());
        }
        if let Some(first @ ('.' | '-')) = name.chars().next() {
            return reject(format!("branch name cannot start with '{first}'"));
        }
        if name.ends_with('/') {
            return reject("branch name cannot end with '/'".into());
        }
        if let Some(seq) = Self::FORBIDDEN_SEQUENCES
            .iter()
            .find(|seq| name.contains(*seq))
        {
            return reject(format!("branch name cannot contain '{seq}'"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || Self::FORBIDDEN_CHARS.contains(c))
        {
            return reject(format!("branch name cannot contain {c:?}"));
        }
        for component in name.split('/') {
            if component.starts_with('.') {
                return reject("path component cannot start with '.'".into());
            }
            if component.ends_with(".lock") {
                return reject("path component cannot end with '.lock'".into());
            }
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content address of a commit: SHA-256 over the parent's hash and the
/// canonical snapshot bytes.
///
/// # Example
///
/// ```
/// use strata::core::types::ContentHash;
///
/// let root = ContentHash::compute(None, br#"{"rooms/101":{"area":42}}"#);
/// let child = ContentHash::compute(Some(&root), br#"{"rooms/101":{"area":42}}"#);
///
/// // Same content on a different parent is a different commit.
/// assert_ne!(root, child);
/// assert_eq!(root.short(7).len(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a full hash in hex characters.
    pub const LEN: usize = 64;

    /// Parse a full hex hash, normalizing to lowercase.
    pub fn new(hash: impl Into<String>) -> Result<Self, TypeError> {
        let hash = hash.into().to_ascii_lowercase();
        if hash.len() != Self::LEN {
            return Err(TypeError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                Self::LEN,
                hash.len()
            )));
        }
        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHash("hash must be hexadecimal".into()));
        }
        Ok(Self(hash))
    }

    /// Hash a snapshot on top of an optional parent hash.
    ///
    /// The parent hash and the snapshot bytes are separated by a NUL byte so
    /// that no snapshot can collide with a different parent/snapshot split.
    pub fn compute(parent: Option<&ContentHash>, snapshot_bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"parent ");
        if let Some(parent) = parent {
            hasher.update(parent.as_str().as_bytes());
        }
        hasher.update(b"\0");
        hasher.update(snapshot_bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// The first `len` hex characters, for display.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Whether this hash starts with the given (case-insensitive) prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(&prefix.to_ascii_lowercase())
    }

    /// Get the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An externally resolved user identity.
///
/// The engine never authenticates; it only records the identifier the
/// caller hands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::InvalidId("user id cannot be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The author of a commit, approval or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    /// Absent for system-authored records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
}

impl Author {
    const SYSTEM_NAME: &'static str = "strata";
    const SYSTEM_EMAIL: &'static str = "system@strata.local";

    /// Create an author without a user id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidAuthor` if the name or email is blank.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let email = email.into();
        if name.trim().is_empty() {
            return Err(TypeError::InvalidAuthor("name cannot be empty".into()));
        }
        if email.trim().is_empty() {
            return Err(TypeError::InvalidAuthor("email cannot be empty".into()));
        }
        Ok(Self {
            name,
            email,
            id: None,
        })
    }

    /// Attach the caller's resolved user id.
    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    /// The author used for commits the engine creates on its own behalf.
    pub fn system() -> Self {
        Self {
            name: Self::SYSTEM_NAME.to_string(),
            email: Self::SYSTEM_EMAIL.to_string(),
            id: None,
        }
    }

    /// Whether this is the system author.
    pub fn is_system(&self) -> bool {
        self.id.is_none() && self.name == Self::SYSTEM_NAME && self.email == Self::SYSTEM_EMAIL
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use strata::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// assert!(now.to_string().contains('T'));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    /// Time elapsed between this timestamp and `now`.
    pub fn age(&self, now: UtcTimestamp) -> chrono::Duration {
        now.0 - self.0
    }

    /// The timestamp `micros` microseconds later.
    pub fn plus_micros(&self, micros: i64) -> Self {
        Self(self.0 + chrono::Duration::microseconds(micros))
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
