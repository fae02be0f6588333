//! Anonymous-pipe driver.
//!
//! Unix fallback for hosts where PTY allocation is unavailable. The shell
//! runs with plain piped stdio: no colour negotiation, no job-control
//! signals, and line-buffering artifacts are possible. Stderr is pumped into
//! the same output channel as stdout so nothing is lost.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use super::{pump_stream, DriverError, OutputReceiver, ShellDriver, OUTPUT_CHANNEL_CAPACITY};
use crate::shell::ShellProfile;

/// Shell driver backed by anonymous pipes.
pub struct PipeDriver {
    child: Child,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    closed: bool,
}

impl PipeDriver {
    /// Spawns the shell with piped stdio in the given working directory.
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

        tracing::debug!(pid = ?pid, shell = %profile.name, "pipe shell spawned");

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
impl ShellDriver for PipeDriver {
    async fn write(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let stdin = self.stdin.as_mut().ok_or(DriverError::Closed)?;
        match stdin.write_all(data).await.and(stdin.flush().await) {
            Ok(()) => Ok(()),
            Err(e) => Err(DriverError::Write(e.to_string())),
        }
    }

    async fn resize(&mut self, _rows: u16, _cols: u16) {
        // No TTY behind the pipes; geometry is meaningless here.
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Dropping stdin delivers EOF for shells that exit on it.
        self.stdin.take();

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = ?self.pid, %status, "shell already exited");
            }
            _ => {
                // kill() delivers SIGKILL and reaps, so this cannot hang.
                if let Err(e) = self.child.kill().await {
                    tracing::debug!(pid = ?self.pid, error = %e, "kill failed (already gone?)");
                }
            }
        }

        tracing::debug!(pid = ?self.pid, "pipe driver closed");
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
            strategy: Strategy::Pipe,
        }
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

    #[tokio::test]
    async fn test_write_and_read_roundtrip() {
        let (mut driver, mut output) =
            PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.write(b"echo pipe_marker_42\n").await.unwrap();
        assert!(recv_until_contains(&mut output, "pipe_marker_42").await);

        driver.close().await;
    }

    #[tokio::test]
    async fn test_stderr_is_merged_into_output() {
        let (mut driver, mut output) =
            PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.write(b"echo err_marker_42 1>&2\n").await.unwrap();
        assert!(recv_until_contains(&mut output, "err_marker_42").await);

        driver.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut driver, _output) = PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.close().await;
        driver.close().await;
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (mut driver, _output) = PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.close().await;
        let result = driver.write(b"echo nope\n").await;
        assert!(matches!(result, Err(DriverError::Closed)));
    }

    #[tokio::test]
    async fn test_close_kills_long_running_shell() {
        let (mut driver, mut output) =
            PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.write(b"sleep 30\n").await.unwrap();

        // Close must not wait out the sleep.
        timeout(Duration::from_secs(5), driver.close())
            .await
            .expect("close did not return promptly");

        // Both pumps observe EOF once the process is gone.
        let ended = timeout(Duration::from_secs(5), async {
            while output.recv().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok(), "output stream did not end after close");
    }

    #[tokio::test]
    async fn test_resize_is_a_noop() {
        let (mut driver, _output) = PipeDriver::open(&sh_profile(), Path::new("/")).unwrap();

        driver.resize(40, 120).await;
        driver.close().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_on_missing_executable() {
        let profile = ShellProfile {
            program: "/definitely/not/a/shell".to_string(),
            args: Vec::new(),
            name: "missing".to_string(),
            strategy: Strategy::Pipe,
        };
        let result = PipeDriver::open(&profile, Path::new("/"));
        assert!(matches!(result, Err(DriverError::Spawn(_))));
    }
}
