//! Shell I/O drivers.
//!
//! A driver owns one spawned shell process and exposes a uniform capability
//! set: write input bytes, stream output chunks, resize, close. Three
//! strategies implement the contract:
//!
//! - [`pty`]: full pseudo-terminal (Unix)
//! - [`pipe`]: anonymous pipes, no TTY semantics (Unix fallback)
//! - [`windows`]: piped cmd.exe subprocess (Windows)
//!
//! Output is delivered as a bounded channel of text chunks, decoded with
//! lossy UTF-8 because terminal output may split escape or multibyte
//! sequences across read boundaries. The channel closing is the normal
//! end-of-session signal.

pub mod pipe;
pub mod pty;
pub mod windows;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::shell::{ShellProfile, Strategy};

/// Buffer size for a single output read.
pub(crate) const READ_BUFFER_SIZE: usize = 4096;

/// Output channel capacity, in chunks.
pub(crate) const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur during driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Failed to spawn the shell process.
    #[error("failed to spawn shell: {0}")]
    Spawn(String),

    /// Failed to write to the shell. The process side is gone and the
    /// session should drain.
    #[error("failed to write to shell: {0}")]
    Write(String),

    /// Operation on a driver that was already closed.
    #[error("driver already closed")]
    Closed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receiver for a driver's decoded output chunks, in read order.
pub type OutputReceiver = mpsc::Receiver<String>;

/// Uniform interface over one spawned shell process.
///
/// The write half (this trait) and the read half (the background task
/// feeding the output channel) touch disjoint handles, so a session's input
/// and output activities never contend on a lock.
#[async_trait]
pub trait ShellDriver: Send {
    /// Writes raw input bytes to the shell, flushing.
    async fn write(&mut self, data: &[u8]) -> Result<(), DriverError>;

    /// Best-effort terminal resize. No-op on strategies without a TTY;
    /// failures are swallowed.
    async fn resize(&mut self, rows: u16, cols: u16);

    /// Releases the process and I/O handles, killing the child if it has
    /// not already exited. Idempotent; never blocks indefinitely.
    async fn close(&mut self);

    /// Process id of the shell, when known.
    fn pid(&self) -> Option<u32>;
}

/// Spawns the driver matching the profile's strategy.
///
/// Returns the driver and the receiver for its output chunks. The initial
/// terminal geometry only applies to the PTY strategy; the pipe strategies
/// have no terminal to size.
pub fn open(
    profile: &ShellProfile,
    cwd: &Path,
    rows: u16,
    cols: u16,
) -> Result<(Box<dyn ShellDriver>, OutputReceiver), DriverError> {
    match profile.strategy {
        Strategy::Pty => {
            let (driver, output) = pty::PtyDriver::open(profile, cwd, rows, cols)?;
            Ok((Box::new(driver), output))
        }
        Strategy::Pipe => {
            let (driver, output) = pipe::PipeDriver::open(profile, cwd)?;
            Ok((Box::new(driver), output))
        }
        Strategy::WindowsPipe => {
            let (driver, output) = windows::WindowsPipeDriver::open(profile, cwd)?;
            Ok((Box::new(driver), output))
        }
    }
}

/// Pumps one async byte stream into the shared output channel until
/// end-of-stream. Used by both pipe strategies; stdout and stderr each get
/// their own pump feeding the same channel, which preserves the "stderr
/// merged into stdout" behavior without platform fd games.
pub(crate) async fn pump_stream<R>(mut stream: R, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match stream.read(&mut buf).await {
            // EOF or a broken pipe both mean the process side is done.
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        }
    }
}
