use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::acquire::acquire;
use super::error::LockingError;
use super::handle::LockFileHandle;
use super::params::LockingParameters;
use super::release::release;

/// Suffix appended by [`lock_path_with_ext`].
pub const LOCK_FILE_EXTENSION: &str = ".lock";

/// Held lock file that is released when dropped.
///
/// Prefer [`LockGuard::release`] when the outcome matters: `Drop` can only log
/// a failed release.
#[derive(Debug)]
pub struct LockGuard {
    handle: Option<LockFileHandle>,
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(
        params: &LockingParameters,
        path: impl Into<PathBuf>,
    ) -> Result<Self, LockingError> {
        let path = path.into();
        let handle = acquire(params, &path)?;
        Ok(Self {
            handle: Some(handle),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<(), LockingError> {
        match self.handle.take() {
            Some(handle) => release(handle, &self.path),
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = release(handle, &self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to release lock file on drop"
                );
            }
        }
    }
}

/// Run `action` while holding the lock file at `path`.
///
/// The action is not run if the lock cannot be acquired. Release happens
/// exactly once, also when the action panics. If the action completes but the
/// release fails, the release error is returned in place of the action's value.
pub fn with_lock<T, F>(params: &LockingParameters, path: &Path, action: F) -> Result<T, LockingError>
where
    F: FnOnce() -> T,
{
    let guard = LockGuard::acquire(params, path)?;
    let output = action();
    if let Err(e) = guard.release() {
        tracing::error!(
            path = %path.display(),
            error = %e,
            "Action completed but the lock file could not be released"
        );
        return Err(e);
    }
    Ok(output)
}

/// Like [`with_lock`] for fallible actions.
///
/// When both the action and the release fail, the action's error is returned
/// and the release error is logged.
pub fn try_with_lock<T, E, F>(params: &LockingParameters, path: &Path, action: F) -> Result<T, E>
where
    E: From<LockingError>,
    F: FnOnce() -> Result<T, E>,
{
    let guard = LockGuard::acquire(params, path)?;
    let outcome = action();
    match (outcome, guard.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => {
            tracing::error!(
                path = %path.display(),
                error = %release_err,
                "Action completed but the lock file could not be released"
            );
            Err(release_err.into())
        }
        (Err(action_err), Ok(())) => Err(action_err),
        (Err(action_err), Err(release_err)) => {
            tracing::warn!(
                path = %path.display(),
                error = %release_err,
                "Lock file release failed after a failed action"
            );
            Err(action_err)
        }
    }
}

/// [`with_lock`] on `path` with `.lock` appended.
pub fn with_lock_ext<T, F>(
    params: &LockingParameters,
    path: &Path,
    action: F,
) -> Result<T, LockingError>
where
    F: FnOnce() -> T,
{
    with_lock(params, &lock_path_with_ext(path), action)
}

/// `path` with `.lock` appended to the whole file name: `data.db` becomes
/// `data.db.lock`.
pub fn lock_path_with_ext(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LOCK_FILE_EXTENSION);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_with_ext() {
        assert_eq!(
            lock_path_with_ext(Path::new("/var/run/data.db")),
            PathBuf::from("/var/run/data.db.lock")
        );
        assert_eq!(
            lock_path_with_ext(Path::new("state")),
            PathBuf::from("state.lock")
        );
    }
}
