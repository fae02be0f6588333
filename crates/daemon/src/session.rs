//! Terminal session controller.
//!
//! Binds one WebSocket connection to one shell driver. The controller owns
//! the whole lifecycle: resolve and spawn (`Spawning`), pump output and feed
//! input concurrently (`Active`), cancel the counterpart activity when
//! either side ends (`Draining`), and release the process (`Closed`).
//!
//! Ordering is part of the contract: output chunks go to the client in the
//! order they were read, input writes reach the driver in the order frames
//! arrive. Nothing is batched or reordered beyond natural chunk boundaries,
//! because terminal semantics depend on byte order.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use protocol::{ControlMessage, DEFAULT_COLS, DEFAULT_ROWS};

use crate::driver::{self, ShellDriver};
use crate::shell::ShellProfile;
use crate::workspace::WorkspaceState;

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Resolving the profile and spawning the driver.
    Spawning,
    /// Output pump and input loop running.
    Active,
    /// One side has terminated; the counterpart is being cancelled.
    Draining,
    /// Driver resources released, process reaped or killed.
    Closed,
}

/// One terminal session: the full-duplex binding between a client
/// connection and a spawned shell process.
pub struct Session {
    id: String,
    state: SessionState,
    workspace: WorkspaceState,
}

impl Session {
    /// Creates a session in the `Spawning` state.
    pub fn new(workspace: WorkspaceState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Spawning,
            workspace,
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            session_id = %self.id,
            from = ?self.state,
            to = ?next,
            "session state"
        );
        self.state = next;
    }

    /// Drives the session until either side terminates.
    ///
    /// Consumes the socket; when this returns, the shell process is gone
    /// and all I/O handles are released.
    pub async fn run<S>(mut self, socket: WebSocketStream<S>, profile: ShellProfile)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let cwd = self.workspace.current();
        tracing::info!(
            session_id = %self.id,
            system = std::env::consts::OS,
            shell = %profile.name,
            strategy = %profile.strategy,
            cwd = %cwd.display(),
            "terminal session connected"
        );

        let (mut sink, mut stream) = socket.split();

        // The banner tells the user which shell they got, before any spawn
        // work that might fail.
        if sink
            .send(WsMessage::Text(banner(&profile)))
            .await
            .is_err()
        {
            self.transition(SessionState::Closed);
            return;
        }

        let (mut shell, mut output) =
            match driver::open(&profile, &cwd, DEFAULT_ROWS, DEFAULT_COLS) {
                Ok(opened) => opened,
                Err(e) => {
                    // The client must see why the session died rather than
                    // hang against a silent socket.
                    tracing::warn!(session_id = %self.id, error = %e, "shell spawn failed");
                    let _ = sink.send(WsMessage::Text(diagnostic(&e.to_string()))).await;
                    let _ = sink.close().await;
                    self.transition(SessionState::Closed);
                    return;
                }
            };

        self.transition(SessionState::Active);

        let cancel = CancellationToken::new();
        let pump_cancel = cancel.clone();
        let pump_id = self.id.clone();

        // Output pump: driver chunks → client text frames, in read order,
        // until the driver stream ends, the socket dies, or we are
        // cancelled by the input side.
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => break,
                    chunk = output.recv() => match chunk {
                        Some(text) => {
                            if sink.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!(session_id = %pump_id, "client send failed, stopping pump");
                                break;
                            }
                        }
                        // Driver end-of-stream: the shell exited.
                        None => break,
                    },
                }
            }
            let _ = sink.close().await;
        });

        // Input loop: client frames → driver writes/resizes, in arrival
        // order. Ends on disconnect, close frame, or a dead driver.
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(session_id = %self.id, error = %e, "client receive failed");
                    break;
                }
            };

            match frame {
                WsMessage::Text(text) => match ControlMessage::decode(&text) {
                    ControlMessage::Input { data } => {
                        if let Err(e) = shell.write(data.as_bytes()).await {
                            tracing::debug!(session_id = %self.id, error = %e, "shell write failed");
                            break;
                        }
                    }
                    ControlMessage::Resize { rows, cols } => {
                        shell.resize(rows, cols).await;
                    }
                },
                // Binary frames carry raw keystroke bytes.
                WsMessage::Binary(bytes) => {
                    if let Err(e) = shell.write(&bytes).await {
                        tracing::debug!(session_id = %self.id, error = %e, "shell write failed");
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                // Ping/pong are answered by the protocol layer.
                _ => {}
            }
        }

        self.transition(SessionState::Draining);
        cancel.cancel();
        shell.close().await;
        let _ = pump.await;
        self.transition(SessionState::Closed);

        tracing::info!(session_id = %self.id, "terminal session closed");
    }
}

/// Welcome banner sent on session start, naming the host and shell.
fn banner(profile: &ShellProfile) -> String {
    format!(
        "\r\n\x1b[32m[TermBridge]\x1b[0m \x1b[90m{} · {}\x1b[0m\r\n",
        std::env::consts::OS,
        profile.name
    )
}

/// Diagnostic line sent when the session cannot start.
fn diagnostic(message: &str) -> String {
    format!("\r\n\x1b[31m[ERROR] {}\x1b[0m\r\n", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_workspace() -> WorkspaceState {
        WorkspaceState::new(PathBuf::from("/"))
    }

    #[test]
    fn test_new_session_starts_spawning() {
        let session = Session::new(test_workspace());
        assert_eq!(session.state(), SessionState::Spawning);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new(test_workspace());
        let b = Session::new(test_workspace());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 36);
    }

    #[test]
    fn test_banner_names_host_and_shell() {
        let profile = ShellProfile::with_program("/bin/bash");
        let text = banner(&profile);
        assert!(text.contains("[TermBridge]"));
        assert!(text.contains("bash"));
        assert!(text.contains(std::env::consts::OS));
    }

    #[test]
    fn test_diagnostic_carries_message() {
        let text = diagnostic("no such file or directory");
        assert!(text.contains("[ERROR]"));
        assert!(text.contains("no such file or directory"));
        // Red, reset, and a fresh line on both sides.
        assert!(text.starts_with("\r\n\x1b[31m"));
        assert!(text.ends_with("\x1b[0m\r\n"));
    }
}
