//! WebSocket accept loop.
//!
//! One accepted connection becomes one terminal session. Everything beyond
//! "accept the connection and hand it to the session controller" — route
//! registration, request validation, static assets — belongs to the
//! embedding application.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;

use crate::session::Session;
use crate::shell::ShellProfile;
use crate::workspace::WorkspaceState;

/// The daemon's connection-accepting entry point.
pub struct Server {
    listener: TcpListener,
    profile: ShellProfile,
    workspace: WorkspaceState,
}

impl Server {
    /// Binds the listener and prepares to serve terminal sessions with the
    /// given shell profile and workspace handle.
    pub async fn bind(
        addr: SocketAddr,
        profile: ShellProfile,
        workspace: WorkspaceState,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self {
            listener,
            profile,
            workspace,
        })
    }

    /// Returns the bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Accepts connections until the task is cancelled or the listener
    /// fails. Each connection runs as its own spawned session.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            shell = %self.profile.name,
            strategy = %self.profile.strategy,
            "listening for terminal connections"
        );

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("failed to accept connection")?;

            let profile = self.profile.clone();
            let workspace = self.workspace.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, profile, workspace).await {
                    tracing::debug!(peer = %peer, error = %e, "connection ended with error");
                }
            });
        }
    }
}

/// Upgrades one TCP connection to a WebSocket and runs a session over it.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    profile: ShellProfile,
    workspace: WorkspaceState,
) -> Result<()> {
    let socket = accept_async(stream)
        .await
        .context("websocket handshake failed")?;

    tracing::debug!(peer = %peer, "websocket established");

    Session::new(workspace).run(socket, profile).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            ShellProfile::with_program("/bin/sh"),
            WorkspaceState::new(PathBuf::from("/")),
        )
        .await
        .unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_address() {
        let first = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            ShellProfile::with_program("/bin/sh"),
            WorkspaceState::new(PathBuf::from("/")),
        )
        .await
        .unwrap();
        let addr = first.local_addr().unwrap();

        let second = Server::bind(
            addr,
            ShellProfile::with_program("/bin/sh"),
            WorkspaceState::new(PathBuf::from("/")),
        )
        .await;

        let err = second.err().expect("second bind should fail");
        assert!(format!("{:#}", err).contains(&addr.to_string()));
    }
}
