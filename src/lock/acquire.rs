use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use super::error::LockingError;
use super::handle::LockFileHandle;
use super::params::LockingParameters;

/// Create the lock file at `path`, retrying according to `params` while it
/// already exists.
///
/// On success the file holds a single `PID=<pid>` line and the returned handle
/// must eventually be passed to [`release`](super::release). Only "already
/// exists" is retried; every other failure is returned on the spot as
/// [`LockingError::CaughtIoError`].
pub fn acquire(params: &LockingParameters, path: &Path) -> Result<LockFileHandle, LockingError> {
    acquire_with_sleep(params, path, std::thread::sleep)
}

pub(crate) fn acquire_with_sleep<S>(
    params: &LockingParameters,
    path: &Path,
    mut sleep: S,
) -> Result<LockFileHandle, LockingError>
where
    S: FnMut(Duration),
{
    let mut strategy = params.retry_strategy.normalized();
    let pause = params.sleep_duration();
    let mut attempt: u64 = 1;

    loop {
        if let Some(handle) = try_create(path)? {
            tracing::debug!(path = %path.display(), attempt, "Acquired lock file");
            return Ok(handle);
        }

        strategy = match strategy.after_collision() {
            Some(next) => next,
            None => {
                tracing::warn!(
                    path = %path.display(),
                    attempts = attempt,
                    "Lock file still held, giving up"
                );
                return Err(LockingError::UnableToAcquireLockFile(path.to_path_buf()));
            }
        };

        tracing::debug!(
            path = %path.display(),
            attempt,
            retry_strategy = %strategy,
            sleep_us = params.sleep_between_retries,
            "Lock file exists, waiting before next attempt"
        );
        sleep(pause);
        attempt = attempt.saturating_add(1);
    }
}

/// One atomic create attempt. `Ok(None)` means somebody else holds the lock.
fn try_create(path: &Path) -> Result<Option<LockFileHandle>, LockingError> {
    let mut file = match open_options().open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(LockingError::CaughtIoError(e)),
    };

    if let Err(e) = write_pid(&mut file) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %cleanup,
                "Failed to remove partially written lock file"
            );
        }
        return Err(LockingError::CaughtIoError(e));
    }

    Ok(Some(LockFileHandle::new(file)))
}

fn write_pid(file: &mut File) -> io::Result<()> {
    writeln!(file, "PID={}", std::process::id())?;
    file.flush()
}

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options
        .read(true)
        .write(true)
        .create_new(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
        .mode(0o644);
    options
}

#[cfg(not(unix))]
fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    options
}
