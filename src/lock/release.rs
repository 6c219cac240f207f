use std::fs;
use std::path::Path;

use super::error::LockingError;
use super::handle::LockFileHandle;

/// Close `handle` and delete the lock file at `path`.
///
/// The handle is closed first so that removal also works where open files
/// cannot be deleted. A failed deletion is reported but not retried.
pub fn release(handle: LockFileHandle, path: &Path) -> Result<(), LockingError> {
    handle.close()?;
    fs::remove_file(path)?;
    tracing::debug!(path = %path.display(), "Released lock file");
    Ok(())
}
