//! Windows piped-subprocess driver.
//!
//! Spawns `cmd.exe` with piped stdio, inheriting the process environment.
//! The Windows console subsystem offers no resize control over a piped
//! child, so `resize` is a no-op — an accepted platform limitation. Stderr
//! is pumped into the same output channel as stdout so nothing is lost,
//! matching the PTY strategies' merged view.
//!
//! The implementation itself is portable (tokio::process), which keeps the
//! strategy compilable and testable on every host; the resolver only ever
//! selects it on Windows.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use super::{pump_stream, DriverError, OutputReceiver, ShellDriver, OUTPUT_CHANNEL_CAPACITY};
use crate::shell::ShellProfile;

/// Shell driver for a piped Windows console process.
pub struct WindowsPipeDriver {
    child: Child,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    closed: bool,
}

impl WindowsPipeDriver {
    /// Spawns the console shell with piped stdio in the given working
    /// directory, inheriting the daemon's environment.
    pub fn open(profile: &ShellProfile, cwd: &Path) -> Result<(Self, OutputReceiver), DriverError> {
        let mut child = Command::new(&profile.program)
            .args(&profile.args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Spawn(e.to_string()))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Spawn("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DriverError::Spawn("stderr was not captured".to_string()))?;

        let (tx, output) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        tokio::spawn(pump_stream(stdout, tx.clone()));
        tokio::spawn(pump_stream(stderr, tx));

        tracing::debug!(pid = ?pid, shell = %profile.name, "windows shell spawned");

        Ok((
            Self {
                child,
                stdin,
                pid,
                closed: false,
            },
            output,
        ))
    }
}

#[async_trait]
impl ShellDriver for WindowsPipeDriver {
    async fn write(&mut self, data: &[u8]) -> Result<(), DriverError> {
        // Ctrl+C arrives as \x03 in the input payload and is written
        // through as-is; cmd.exe interprets it from the pipe.
        let stdin = self.stdin.as_mut().ok_or(DriverError::Closed)?;
        match stdin.write_all(data).await.and(stdin.flush().await) {
            Ok(()) => Ok(()),
            Err(e) => Err(DriverError::Write(e.to_string())),
        }
    }

    async fn resize(&mut self, _rows: u16, _cols: u16) {
        // Not supported by the piped console subsystem; acknowledged
        // silently.
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.stdin.take();

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = ?self.pid, %status, "shell already exited");
            }
            _ => {
                // Forcible termination; kill() reaps, so this cannot hang.
                if let Err(e) = self.child.kill().await {
                    tracing::debug!(pid = ?self.pid, error = %e, "kill failed (already gone?)");
                }
            }
        }

        tracing::debug!(pid = ?self.pid, "windows driver closed");
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}
