pub mod config;
pub mod lock;
pub mod output;

pub use lock::{
    acquire, lock_path_with_ext, release, try_with_lock, with_lock, with_lock_ext, LockFileHandle,
    LockGuard, LockingError, LockingParameters, RetryStrategy,
};
