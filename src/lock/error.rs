use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong while taking or giving back a lock file.
///
/// Callers match on the variant: `UnableToAcquireLockFile` means the lock is
/// busy and the retry budget ran out, `CaughtIoError` means the filesystem
/// itself misbehaved.
#[derive(Debug, Error)]
pub enum LockingError {
    #[error("unable to acquire lock file {}", .0.display())]
    UnableToAcquireLockFile(PathBuf),

    #[error("lock file i/o error: {0}")]
    CaughtIoError(#[from] io::Error),
}

impl LockingError {
    pub fn is_unable_to_acquire(&self) -> bool {
        matches!(self, LockingError::UnableToAcquireLockFile(_))
    }

    /// Path of the contended lock file, if that is what failed.
    pub fn contended_path(&self) -> Option<&Path> {
        match self {
            LockingError::UnableToAcquireLockFile(path) => Some(path),
            LockingError::CaughtIoError(_) => None,
        }
    }

    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            LockingError::CaughtIoError(e) => Some(e),
            LockingError::UnableToAcquireLockFile(_) => None,
        }
    }
}
