//! Report Logging
//!
//! Best-effort report sink used by the cycle runner:
//! - Console echo is synchronous (through `tracing`)
//! - File append is queued to a dedicated writer thread and never blocks
//!   the caller
//! - Transient lock contention is retried a bounded number of times; any
//!   other failure is reported on the console and the line is dropped
//!
//! Logging never fails a cycle.

use anyhow::{Context, Result};
use chrono::{Local, Timelike};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// tracing target for report lines echoed to the console.
pub const REPORT_TARGET: &str = "chainbench::report";

/// Attempts per line before the writer gives up on a locked file.
pub const MAX_WRITE_ATTEMPTS: u32 = 10;

/// Sleep between attempts on a locked file.
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Sink for human-readable run reports. Fire-and-forget.
pub trait ReportLog: Send + Sync {
    fn log(&self, message: &str);
}

/// Initialize console tracing. `RUST_LOG` overrides the default filter.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chainbench=debug"
    } else {
        "chainbench=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// WRITE ERRORS
// =============================================================================

/// Why a line never reached the log file.
#[derive(Debug)]
pub enum LogWriteError {
    /// File stayed locked for every attempt.
    LockContention { attempts: u32 },
    /// Any other I/O failure; not retried.
    Permanent(io::Error),
}

impl fmt::Display for LogWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockContention { attempts } => {
                write!(f, "failed to append to log file after {} retries", attempts)
            }
            Self::Permanent(e) => write!(f, "error appending to log file: {}", e),
        }
    }
}

impl std::error::Error for LogWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Permanent(e) => Some(e),
            Self::LockContention { .. } => None,
        }
    }
}

/// Lock/sharing violations and would-block are worth another attempt.
fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) || is_lock_violation(err)
}

// ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_lock_violation(_err: &io::Error) -> bool {
    false
}

/// Run `attempt` until it succeeds, fails permanently, or the retry budget
/// is spent. Returns the number of attempts used on success.
fn append_with_retry<F>(mut attempt: F, delay: Duration) -> Result<u32, LogWriteError>
where
    F: FnMut() -> io::Result<()>,
{
    for n in 1..=MAX_WRITE_ATTEMPTS {
        match attempt() {
            Ok(()) => return Ok(n),
            Err(e) if is_transient(&e) => thread::sleep(delay),
            Err(e) => return Err(LogWriteError::Permanent(e)),
        }
    }
    Err(LogWriteError::LockContention {
        attempts: MAX_WRITE_ATTEMPTS,
    })
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

// =============================================================================
// FILE LOGGER (Background Writer)
// =============================================================================

enum WriterMessage {
    Line(String),
    Flush(Sender<()>),
    Shutdown,
}

/// Console + append-only file logger with a background writer thread.
pub struct FileLogger {
    path: PathBuf,
    tx: Sender<WriterMessage>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileLogger {
    /// Create `dir` if needed and log to `{dir}/{YYYYmmddHHMMSS}_log.txt`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let file_name = format!("{}_log.txt", Local::now().format("%Y%m%d%H%M%S"));
        Self::with_path(dir.join(file_name))
    }

    /// Log to an explicit file path.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let writer_path = path.clone();

        let handle = thread::Builder::new()
            .name("chainbench-log".to_string())
            .spawn(move || run_writer(writer_path, rx))
            .context("failed to spawn log writer thread")?;

        Ok(Self {
            path,
            tx,
            writer: Mutex::new(Some(handle)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until every line queued so far has been attempted.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(WriterMessage::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Drain pending lines and join the writer. Idempotent.
    pub fn shutdown(&self) {
        if let Some(handle) = self.writer.lock().take() {
            let _ = self.tx.send(WriterMessage::Shutdown);
            if handle.join().is_err() {
                warn!("log writer thread panicked");
            }
        }
    }
}

impl ReportLog for FileLogger {
    fn log(&self, message: &str) {
        let now = Local::now();
        let line = format!(
            "{}.{:05} - {}",
            now.format("%H:%M:%S"),
            now.nanosecond() % 1_000_000_000 / 10_000,
            message
        );

        info!(target: REPORT_TARGET, "{}", message);

        if self.tx.send(WriterMessage::Line(line)).is_err() {
            warn!(path = %self.path.display(), "log writer stopped, line dropped");
        }
    }
}

impl Drop for FileLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_writer(path: PathBuf, rx: Receiver<WriterMessage>) {
    for msg in rx.iter() {
        match msg {
            WriterMessage::Line(line) => {
                if let Err(e) = append_with_retry(|| append_line(&path, &line), RETRY_DELAY) {
                    warn!(path = %path.display(), "{}", e);
                }
            }
            WriterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            WriterMessage::Shutdown => break,
        }
    }
}

// =============================================================================
// IN-MEMORY LOG
// =============================================================================

/// Collects messages in memory. Also echoes them through tracing.
#[derive(Debug, Default)]
pub struct MemoryLog {
    messages: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Messages starting with `prefix`, in arrival order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl ReportLog for MemoryLog {
    fn log(&self, message: &str) {
        info!(target: REPORT_TARGET, "{}", message);
        self.messages.lock().push(message.to_string());
    }
}
