use lockrun::lock::{acquire, release, LockingError, LockingParameters, RetryStrategy};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn no_retry() -> LockingParameters {
    LockingParameters::new(RetryStrategy::None, 0)
}

fn assert_busy(result: Result<lockrun::LockFileHandle, LockingError>, path: &Path) {
    match result {
        Err(LockingError::UnableToAcquireLockFile(p)) => assert_eq!(p, path),
        other => panic!("expected UnableToAcquireLockFile, got {:?}", other),
    }
}

#[test]
fn test_acquire_release_acquire_scenario() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.lock");

    let first = acquire(&no_retry(), &path).unwrap();
    assert!(path.exists());

    assert_busy(acquire(&no_retry(), &path), &path);

    release(first, &path).unwrap();
    assert!(!path.exists());

    let third = acquire(&no_retry(), &path).unwrap();
    release(third, &path).unwrap();
}

#[test]
fn test_lock_file_contains_pid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pid.lock");

    let handle = acquire(&no_retry(), &path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, format!("PID={}\n", std::process::id()));
    assert_eq!(content.lines().count(), 1);

    release(handle, &path).unwrap();
}

#[test]
fn test_only_one_thread_wins() {
    let dir = TempDir::new().unwrap();
    let path = Arc::new(dir.path().join("race.lock"));
    let contenders = 16;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                acquire(&no_retry(), &path)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.into_iter().filter_map(|r| r.ok()).collect();
    assert_eq!(winners.len(), 1);

    for handle in winners {
        release(handle, &path).unwrap();
    }
}

#[test]
fn test_retry_exhaustion_waits_between_attempts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("held.lock");
    let held = acquire(&no_retry(), &path).unwrap();

    let params = LockingParameters::new(RetryStrategy::NumberOfTimes(3), 20_000);
    let start = Instant::now();
    assert_busy(acquire(&params, &path), &path);
    assert!(start.elapsed() >= Duration::from_millis(60));

    release(held, &path).unwrap();
}

#[test]
fn test_zero_retries_fail_fast() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("held.lock");
    let held = acquire(&no_retry(), &path).unwrap();

    let params = LockingParameters::new(RetryStrategy::NumberOfTimes(0), 10_000_000);
    let start = Instant::now();
    assert_busy(acquire(&params, &path), &path);
    assert!(start.elapsed() < Duration::from_secs(5));

    release(held, &path).unwrap();
}

#[test]
fn test_indefinite_waits_for_release() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handoff.lock");
    let held = acquire(&no_retry(), &path).unwrap();

    let releaser = {
        let path = path.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release(held, &path).unwrap();
        })
    };

    let params = LockingParameters::new(RetryStrategy::Indefinite, 5_000);
    let handle = acquire(&params, &path).unwrap();
    releaser.join().unwrap();

    release(handle, &path).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_missing_directory_is_io_error_without_retry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("x.lock");

    let params = LockingParameters::new(RetryStrategy::Indefinite, 10_000_000);
    let start = Instant::now();
    match acquire(&params, &path) {
        Err(LockingError::CaughtIoError(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::NotFound)
        }
        other => panic!("expected CaughtIoError, got {:?}", other),
    }
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_release_after_external_removal_reports_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.lock");

    let handle = acquire(&no_retry(), &path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = release(handle, &path).unwrap_err();
    assert!(!err.is_unable_to_acquire());
    assert_eq!(
        err.io_error().map(|e| e.kind()),
        Some(std::io::ErrorKind::NotFound)
    );
}

#[test]
fn test_existing_plain_file_counts_as_held() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stale.lock");
    std::fs::write(&path, "PID=1\n").unwrap();

    assert_busy(acquire(&no_retry(), &path), &path);
    // never touched
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "PID=1\n");
}
