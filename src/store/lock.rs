//! store::lock
//!
//! Exclusive lock guarding a store document.
//!
//! # Architecture
//!
//! The lock file sits next to the document (`store.json` is guarded by
//! `store.json.lock`). Holding the OS-level exclusive lock for the whole
//! read-modify-write cycle makes every [`FileStore`](super::FileStore)
//! call atomic across threads and processes.
//!
//! # Invariants
//!
//! - The lock is held for the entire read-modify-write cycle
//! - The lock is released on drop (RAII)
//! - The lock file itself is never deleted
//!
//! # Example
//!
//! ```no_run
//! use strata::store::StoreLock;
//! use std::path::Path;
//!
//! let lock = StoreLock::acquire(Path::new("/srv/hq/.strata/store.json"))?;
//! assert!(lock.is_held());
//! // ... read, modify, write ...
//! drop(lock);
//! # Ok::<(), strata::store::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to take the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a store document.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: Option<File>,
}

impl StoreLock {
    /// Path of the lock file guarding `document`.
    pub fn lock_path(document: &Path) -> PathBuf {
        let mut name = document
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".lock");
        document.with_file_name(name)
    }

    fn open(document: &Path) -> Result<(PathBuf, File), LockError> {
        let path = Self::lock_path(document);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;
        Ok((path, file))
    }

    /// Acquire the lock, waiting for any current holder to release it.
    ///
    /// # Errors
    ///
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(document: &Path) -> Result<Self, LockError> {
        let (path, file) = Self::open(document)?;
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Acquire the lock without waiting.
    ///
    /// Returns `None` if another strata process holds it.
    pub fn try_acquire(document: &Path) -> Result<Option<Self>, LockError> {
        let (path, file) = Self::open(document)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path,
                file: Some(file),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
