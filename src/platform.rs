use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use tracing::warn;

#[cfg(unix)]
use signal_hook::{
    consts::{SIGINT, SIGPIPE, SIGTERM, SIGUSR1},
    iterator::Signals,
};

#[cfg(all(
    unix,
    any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )
))]
use signal_hook::consts::SIGINFO;

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Set once a shutdown has been requested
pub static SHOULD_TERMINATE: AtomicBool = AtomicBool::new(false);
pub static TERMINATED_BY_SIGNAL: AtomicBool = AtomicBool::new(false);
static TERMINATION_EXIT_CODE: AtomicI32 = AtomicI32::new(ExitCode::SignalInt as i32);

/// Control messages broadcast by the signal handler to processing threads
#[derive(Debug, Clone)]
pub enum Ctrl {
    Shutdown { immediate: bool },
    PrintStats,
}

fn request_shutdown(sender: &Sender<Ctrl>, code: ExitCode, shutdown_count: &mut u32) {
    SHOULD_TERMINATE.store(true, Ordering::Relaxed);
    TERMINATED_BY_SIGNAL.store(true, Ordering::Relaxed);
    TERMINATION_EXIT_CODE.store(code as i32, Ordering::Relaxed);
    *shutdown_count += 1;
    let immediate = *shutdown_count > 1;
    // reaches a single receiver; the other threads poll SHOULD_TERMINATE
    let _ = sender.send(Ctrl::Shutdown { immediate });
    if immediate {
        code.exit();
    }
}

/// Exit code matching the signal that stopped the run
pub fn termination_exit_code() -> ExitCode {
    match TERMINATION_EXIT_CODE.load(Ordering::Relaxed) {
        143 => ExitCode::SignalTerm,
        141 => ExitCode::SignalPipe,
        _ => ExitCode::SignalInt,
    }
}

/// Signal handler for graceful shutdown
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        #[cfg(unix)]
        {
            #[allow(unused_mut)]
            let mut signals_to_handle = vec![SIGINT, SIGPIPE, SIGTERM, SIGUSR1];

            // Ctrl-T on BSD-like systems
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly"
            ))]
            signals_to_handle.push(SIGINFO);

            let mut signals = Signals::new(&signals_to_handle)?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    match sig {
                        SIGINT => request_shutdown(&ctrl_sender, ExitCode::SignalInt, &mut shutdown_count),
                        SIGTERM => {
                            warn!("received SIGTERM, shutting down");
                            request_shutdown(&ctrl_sender, ExitCode::SignalTerm, &mut shutdown_count);
                        }
                        SIGPIPE => {
                            SHOULD_TERMINATE.store(true, Ordering::Relaxed);
                            TERMINATED_BY_SIGNAL.store(true, Ordering::Relaxed);
                            ExitCode::SignalPipe.exit();
                        }
                        SIGUSR1 => {
                            let _ = ctrl_sender.send(Ctrl::PrintStats);
                        }
                        #[cfg(any(
                            target_os = "macos",
                            target_os = "freebsd",
                            target_os = "openbsd",
                            target_os = "netbsd",
                            target_os = "dragonfly"
                        ))]
                        SIGINFO => {
                            let _ = ctrl_sender.send(Ctrl::PrintStats);
                        }
                        other => warn!(signal = other, "received unexpected signal"),
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        request_shutdown(&ctrl_sender, ExitCode::SignalInt, &mut shutdown_count);
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }

    pub fn should_terminate() -> bool {
        SHOULD_TERMINATE.load(Ordering::Relaxed)
    }
}

fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
    #[cfg(windows)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
    }
}

/// Stdout writer that treats a closed pipe as a quiet exit
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SafeStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stdout.write(buf) {
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stdout.flush() {
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            other => other,
        }
    }
}

/// Stderr writer for user-facing messages
pub struct SafeStderr {
    stderr: io::Stderr,
}

impl SafeStderr {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }

    /// Write a line; when stderr itself is gone there is nobody left to tell
    pub fn writeln(&mut self, data: &str) {
        if writeln!(self.stderr, "{}", data).is_err() {
            ExitCode::GeneralError.exit();
        }
    }
}

impl Default for SafeStderr {
    fn default() -> Self {
        Self::new()
    }
}

fn create_helpful_error_message(path: &Path, error: &io::Error) -> String {
    let base_msg = format!("Cannot create output file '{}': {}", path.display(), error);

    let suggestion = match error.kind() {
        io::ErrorKind::PermissionDenied => "Suggestion: Check permissions of the output directory",
        io::ErrorKind::NotFound => "Suggestion: Parent directory does not exist, create it first",
        _ => return base_msg,
    };

    format!("{}\n{}", base_msg, suggestion)
}

/// File writer that reports failures with the file path
pub struct SafeFileOut {
    file: File,
    path: PathBuf,
}

impl SafeFileOut {
    /// Create the file, truncating it if it exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match File::create(path) {
            Ok(file) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(e) => Err(anyhow!("{}", create_helpful_error_message(path, &e))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and fsync, so a later success marker never precedes the data
    pub fn finish(mut self) -> Result<()> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_all())
            .map_err(|e| anyhow!("Output file flush failed '{}': {}", self.path.display(), e))
    }
}

impl Write for SafeFileOut {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
