//! PTY driver.
//!
//! Spawns the shell attached to a newly allocated pseudo-terminal pair so
//! interactive programs (editors, pagers, colour output) behave as on a real
//! terminal. portable-pty places the child in its own session with the slave
//! end as its controlling terminal, which keeps signal delivery (Ctrl+C,
//! window-size changes) working.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use super::{DriverError, OutputReceiver, ShellDriver, OUTPUT_CHANNEL_CAPACITY, READ_BUFFER_SIZE};
use crate::shell::ShellProfile;

/// Shell driver backed by a pseudo-terminal pair.
pub struct PtyDriver {
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    closed: bool,
}

impl PtyDriver {
    /// Allocates a PTY pair sized `rows`×`cols` and spawns the shell onto
    /// its slave end.
    ///
    /// The slave handle is dropped in the parent after spawn; the returned
    /// receiver yields output chunks read from the master until the child
    /// exits.
    pub fn open(
        profile: &ShellProfile,
        cwd: &Path,
        rows: u16,
        cols: u16,
    ) -> Result<(Self, OutputReceiver), DriverError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| DriverError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&profile.program);
        cmd.args(&profile.args);
        cmd.cwd(cwd);
        cmd.env("TERM", "xterm-256color");
        cmd.env("LANG", "en_US.UTF-8");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| DriverError::Spawn(e.to_string()))?;

        // The parent must not hold the slave open or it would never observe
        // EOF on the master after the child exits.
        drop(pair.slave);

        let pid = child.process_id();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| DriverError::Spawn(e.to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| DriverError::Spawn(e.to_string()))?;

        let (tx, output) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        spawn_read_task(reader, tx, pid);

        tracing::debug!(pid = ?pid, shell = %profile.name, "pty shell spawned");

        Ok((
            Self {
                master: Some(pair.master),
                writer: Some(writer),
                child,
                pid,
                closed: false,
            },
            output,
        ))
    }
}

/// Reads the master end on the blocking pool, feeding decoded chunks into
/// the output channel. EOF and read errors (EIO once the child is gone) are
/// the normal end-of-session signal, not conditions to propagate.
fn spawn_read_task(
    mut reader: Box<dyn std::io::Read + Send>,
    tx: mpsc::Sender<String>,
    pid: Option<u32>,
) {
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.blocking_send(chunk).is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(pid = ?pid, "pty output stream ended");
    });
}

#[async_trait]
impl ShellDriver for PtyDriver {
    async fn write(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let writer = self.writer.as_mut().ok_or(DriverError::Closed)?;
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| DriverError::Write(e.to_string()))
    }

    async fn resize(&mut self, rows: u16, cols: u16) {
        let Some(master) = self.master.as_ref() else {
            return;
        };
        if let Err(e) = master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }) {
            // Best-effort: a stale session without a window-size ioctl must
            // not take the session down.
            tracing::trace!(pid = ?self.pid, error = %e, "pty resize ignored");
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.writer.take();

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = ?self.pid, ?status, "shell already exited");
            }
            _ => {
                if let Err(e) = self.child.kill() {
                    tracing::debug!(pid = ?self.pid, error = %e, "kill failed (already gone?)");
                }
                // Reap; returns promptly once the kill has landed.
                let _ = self.child.wait();
            }
        }

        // Releasing the master unblocks the read task with EOF/EIO.
        self.master.take();
        tracing::debug!(pid = ?self.pid, "pty driver closed");
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::shell::Strategy;
    use std::time::Duration;
    use tokio::time::timeout;

    fn sh_profile() -> ShellProfile {
        ShellProfile {
            program: "/bin/sh".to_string(),
            args: Vec::new(),
            name: "sh".to_string(),
            strategy: Strategy::Pty,
        }
    }

    /// Opens a /bin/sh PTY session, or None on hosts without PTY support
    /// (the resolver would have picked the pipe strategy there anyway).
    fn open_sh() -> Option<(PtyDriver, OutputReceiver)> {
        PtyDriver::open(&sh_profile(), Path::new("/"), 24, 80).ok()
    }

    async fn recv_until_contains(output: &mut OutputReceiver, needle: &str) -> bool {
        let mut collected = String::new();
        for _ in 0..50 {
            match timeout(Duration::from_millis(200), output.recv()).await {
                Ok(Some(chunk)) => {
                    collected.push_str(&chunk);
                    if collected.contains(needle) {
                        return true;
                    }
                }
                Ok(None) => return false,
                Err(_) => {}
            }
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_and_read_roundtrip() {
        let Some((mut driver, mut output)) = open_sh() else {
            return;
        };

        driver.write(b"echo pty_marker_42\n").await.unwrap();
        assert!(recv_until_contains(&mut output, "pty_marker_42").await);

        driver.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_is_idempotent() {
        let Some((mut driver, _output)) = open_sh() else {
            return;
        };

        driver.close().await;
        driver.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_after_close_fails() {
        let Some((mut driver, _output)) = open_sh() else {
            return;
        };

        driver.close().await;
        let result = driver.write(b"echo nope\n").await;
        assert!(matches!(result, Err(DriverError::Closed)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_ends_output_stream() {
        let Some((mut driver, mut output)) = open_sh() else {
            return;
        };

        driver.close().await;

        // The read task must observe EOF and drop the sender promptly.
        let ended = timeout(Duration::from_secs(5), async {
            while output.recv().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok(), "output stream did not end after close");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resize_does_not_fail() {
        let Some((mut driver, _output)) = open_sh() else {
            return;
        };

        driver.resize(40, 120).await;
        driver.close().await;
        // Resize after close is equally silent.
        driver.resize(50, 132).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pid_is_reported() {
        let Some((mut driver, _output)) = open_sh() else {
            return;
        };

        assert!(driver.pid().is_some());
        driver.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawn_failure_on_missing_executable() {
        let profile = ShellProfile {
            program: "/definitely/not/a/shell".to_string(),
            args: Vec::new(),
            name: "missing".to_string(),
            strategy: Strategy::Pty,
        };
        // Hosts without PTY support fail earlier, at openpty; both paths
        // must surface as Spawn.
        let result = PtyDriver::open(&profile, Path::new("/"), 24, 80);
        assert!(matches!(result, Err(DriverError::Spawn(_))));
    }
}
