use std::fs::File;
use std::io;

/// Open handle on a lock file this process created.
///
/// Deliberately not `Clone`: `release` takes it by value, so a handle can be
/// released at most once.
#[derive(Debug)]
pub struct LockFileHandle {
    file: File,
}

impl LockFileHandle {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }

    /// Close the descriptor, reporting errors that dropping a `File` would
    /// swallow.
    #[cfg(unix)]
    pub(crate) fn close(self) -> io::Result<()> {
        use std::os::unix::io::IntoRawFd;

        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` was just taken out of the `File`, so nothing else owns it.
        if unsafe { libc::close(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub(crate) fn close(self) -> io::Result<()> {
        drop(self.file);
        Ok(())
    }
}
