use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, ExitStatus};

/// Reset SIGPIPE to default behavior so a closed pipe ends the process quietly
/// instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lockrun::config::parser::load_config;
use lockrun::lock::{self, LockingError, LockingParameters, RetryStrategy};
use lockrun::output::formatter;

/// sysexits(3) codes, as used by lockfile(1).
const EXIT_IOERR: u8 = 74;
const EXIT_TEMPFAIL: u8 = 75;
const EXIT_FAILURE: u8 = 1;

/// lockrun - run a command while holding a lock file
#[derive(Parser)]
#[command(name = "lockrun", version, about, long_about = None)]
struct Cli {
    /// YAML file with `retry` and `sleep_between_retries` settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// What to do while the lock is held elsewhere: none, indefinite, or a retry count
    #[arg(short, long, value_name = "STRATEGY")]
    retry: Option<RetryStrategy>,

    /// Microseconds to wait between attempts
    #[arg(short, long, value_name = "MICROS")]
    sleep: Option<u64>,

    /// Append `.lock` to LOCK_FILE
    #[arg(short, long)]
    ext: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Lock file to create for the duration of the command
    lock_file: PathBuf,

    /// Command to run while the lock is held
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

fn main() -> ExitCode {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<LockingError>() {
            Some(lock_err) => {
                formatter::print_locking_error(lock_err);
                ExitCode::from(exit_code_for(lock_err))
            }
            None => {
                formatter::print_error(&format!("{:#}", e));
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<ExitCode> {
    let params = resolve_parameters(cli)?;
    let lock_path = if cli.ext {
        lock::lock_path_with_ext(&cli.lock_file)
    } else {
        cli.lock_file.clone()
    };

    tracing::debug!(
        lock = %lock_path.display(),
        retry_strategy = %params.retry_strategy,
        sleep_us = params.sleep_between_retries,
        "Acquiring lock"
    );

    // Installed before the lock is taken and dropped only after it is released.
    #[cfg(unix)]
    let _signals = signals::SignalGuard::install();

    let status = lock::try_with_lock(&params, &lock_path, || run_command(&cli.command))?;
    Ok(exit_code_for_status(&lock_path, status))
}

/// Defaults, then the config file, then command-line flags.
fn resolve_parameters(cli: &Cli) -> Result<LockingParameters> {
    let mut params = match &cli.config {
        Some(path) => load_config(path)?.to_parameters()?,
        None => LockingParameters::default(),
    };
    if let Some(retry) = cli.retry {
        params.retry_strategy = retry;
    }
    if let Some(sleep) = cli.sleep {
        params.sleep_between_retries = sleep;
    }
    Ok(params)
}

fn run_command(argv: &[OsString]) -> Result<ExitStatus> {
    #[cfg(unix)]
    signals::lock_held();

    let (program, args) = argv.split_first().context("No command given")?;

    #[cfg(unix)]
    if let Some(signal) = signals::pending_termination() {
        anyhow::bail!("Interrupted by signal {} before the command started", signal);
    }

    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("Failed to run '{}'", program.to_string_lossy()))?;

    #[cfg(unix)]
    signals::track_child(child.id());

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for '{}'", program.to_string_lossy()));

    #[cfg(unix)]
    signals::track_child(0);

    status
}

fn exit_code_for(err: &LockingError) -> u8 {
    match err {
        LockingError::UnableToAcquireLockFile(_) => EXIT_TEMPFAIL,
        LockingError::CaughtIoError(_) => EXIT_IOERR,
    }
}

fn exit_code_for_status(lock_path: &Path, status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FAILURE));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            formatter::print_killed_by_signal(lock_path, signal);
            return ExitCode::from(128u8.saturating_add(signal as u8));
        }
    }

    let _ = lock_path;
    ExitCode::from(EXIT_FAILURE)
}

#[cfg(unix)]
mod signals {
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    /// Delivered by the terminal to the whole foreground group, so the child
    /// already has them.
    const INTERACTIVE: [libc::c_int; 2] = [libc::SIGINT, libc::SIGQUIT];
    /// Sent to lockrun alone (kill, timeout(1), service managers, hangup);
    /// passed on to the child.
    const TERMINATION: [libc::c_int; 2] = [libc::SIGTERM, libc::SIGHUP];

    static HOLDING: AtomicBool = AtomicBool::new(false);
    static CHILD: AtomicI32 = AtomicI32::new(0);
    static PENDING: AtomicI32 = AtomicI32::new(0);

    extern "C" fn on_signal(sig: libc::c_int) {
        if !HOLDING.load(Ordering::SeqCst) {
            // Still waiting for the lock: nothing to clean up, die as usual.
            unsafe {
                libc::signal(sig, libc::SIG_DFL);
                libc::raise(sig);
            }
            return;
        }

        if TERMINATION.contains(&sig) {
            PENDING.store(sig, Ordering::SeqCst);
            let child = CHILD.load(Ordering::SeqCst);
            if child > 0 {
                unsafe {
                    libc::kill(child, sig);
                }
            }
        }
    }

    /// Catches INT, QUIT, TERM and HUP from before the lock is acquired until
    /// after it is released.
    ///
    /// Until [`lock_held`] is called the handler re-raises with the default
    /// action, so waiting for a busy lock stays interruptible. Afterwards TERM
    /// and HUP are forwarded to the running command, INT and QUIT are left to
    /// the command alone (as system(3) does), and lockrun keeps running until
    /// the lock file is gone. Signals that were ignored on entry stay ignored.
    pub struct SignalGuard {
        saved: Vec<(libc::c_int, libc::sigaction)>,
    }

    impl SignalGuard {
        pub fn install() -> Self {
            HOLDING.store(false, Ordering::SeqCst);
            CHILD.store(0, Ordering::SeqCst);
            PENDING.store(0, Ordering::SeqCst);

            let mut saved = Vec::new();
            for sig in INTERACTIVE.into_iter().chain(TERMINATION) {
                // SAFETY: plain sigaction(2) calls on zero-initialised structs.
                unsafe {
                    let mut previous: libc::sigaction = std::mem::zeroed();
                    if libc::sigaction(sig, std::ptr::null(), &mut previous) != 0
                        || previous.sa_sigaction == libc::SIG_IGN
                    {
                        continue;
                    }

                    let mut action: libc::sigaction = std::mem::zeroed();
                    action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
                    action.sa_flags = libc::SA_RESTART;
                    libc::sigemptyset(&mut action.sa_mask);
                    if libc::sigaction(sig, &action, std::ptr::null_mut()) == 0 {
                        saved.push((sig, previous));
                    } else {
                        tracing::warn!(signal = sig, "Failed to install signal handler");
                    }
                }
            }
            Self { saved }
        }
    }

    impl Drop for SignalGuard {
        fn drop(&mut self) {
            for (sig, previous) in &self.saved {
                unsafe {
                    libc::sigaction(*sig, previous, std::ptr::null_mut());
                }
            }
            HOLDING.store(false, Ordering::SeqCst);
            CHILD.store(0, Ordering::SeqCst);
        }
    }

    /// The lock file exists from here on; signals must no longer kill us.
    pub fn lock_held() {
        HOLDING.store(true, Ordering::SeqCst);
    }

    /// Record the running command so TERM/HUP reach it. A signal that came in
    /// before the command existed is delivered now.
    pub fn track_child(pid: u32) {
        let pid = i32::try_from(pid).unwrap_or(0);
        CHILD.store(pid, Ordering::SeqCst);
        let pending = PENDING.load(Ordering::SeqCst);
        if pid > 0 && pending != 0 {
            unsafe {
                libc::kill(pid, pending);
            }
        }
    }

    /// TERM or HUP received while holding the lock, if any.
    pub fn pending_termination() -> Option<libc::c_int> {
        match PENDING.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }
}
