//! engine::error
//!
//! The closed error taxonomy every engine operation reports.

use std::fmt;

use thiserror::Error;

use crate::core::types::TypeError;
use crate::store::StoreError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller supplied input that can never succeed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation lost a race or hit a state that forbids it.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor may not perform the operation on this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Store => "store",
        };
        f.write_str(s)
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::Store(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        EngineError::Forbidden(msg.into())
    }

    /// Persisted history is inconsistent (e.g. a parent cycle).
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        EngineError::Store(StoreError::Corrupt(msg.into()))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::CasFailed { expected, actual } => EngineError::Conflict(format!(
                "concurrent update: expected {expected}, found {actual}"
            )),
            StoreError::Duplicate(what) => EngineError::Conflict(format!("{what} already exists")),
            other => EngineError::Store(other),
        }
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let cas: EngineError = StoreError::CasFailed {
            expected: "a".into(),
            actual: "b".into(),
        }
        .into();
        assert_eq!(cas.kind(), ErrorKind::Conflict);
        assert!(cas.to_string().contains("expected a, found b"));

        let dup: EngineError = StoreError::Duplicate("branch 'x'".into()).into();
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let missing: EngineError = StoreError::NotFound("commit 1".into()).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let corrupt: EngineError = StoreError::Corrupt("bad".into()).into();
        assert_eq!(corrupt.kind(), ErrorKind::Store);
    }

    #[test]
    fn type_errors_are_validation() {
        let err: EngineError = TypeError::InvalidBranchName("..".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
    }
}
