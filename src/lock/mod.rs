//! Lock files as a cross-process mutual exclusion token.
//!
//! Exclusivity comes from a single atomic "create if absent" call on the
//! filesystem. There is no kernel-level advisory locking and no in-process
//! bookkeeping: whoever manages to create the file owns the lock until the
//! file is removed again.

pub mod acquire;
pub mod error;
pub mod handle;
pub mod params;
pub mod release;
pub mod scoped;

pub use acquire::acquire;
pub use error::LockingError;
pub use handle::LockFileHandle;
pub use params::{LockingParameters, RetryStrategy};
pub use release::release;
pub use scoped::{lock_path_with_ext, try_with_lock, with_lock, with_lock_ext, LockGuard};
