use colored::Colorize;
use std::path::Path;

use crate::lock::LockingError;

// stderr throughout: stdout belongs to the wrapped command.

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Describe a locking failure in terms a shell user can act on.
pub fn print_locking_error(err: &LockingError) {
    match err {
        LockingError::UnableToAcquireLockFile(path) => {
            print_error(&format!(
                "Lock file {} is held by another process.",
                path.display()
            ));
            eprintln!(
                "  {}",
                "If no process owns it any more, check the PID inside and remove the file."
                    .dimmed()
            );
        }
        LockingError::CaughtIoError(e) => {
            print_error(&format!("Lock file I/O failed: {}", e));
        }
    }
}

/// Note a command that was stopped by a signal while the lock was held.
pub fn print_killed_by_signal(lock_path: &Path, signal: i32) {
    print_warning(&format!(
        "Command terminated by signal {} (lock {} released).",
        signal,
        lock_path.display()
    ));
}
