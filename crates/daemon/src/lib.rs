//! # TermBridge Daemon Library
//!
//! This crate provides the daemon functionality for TermBridge, bridging a
//! browser-based terminal client to a real shell on the host machine over a
//! WebSocket.
//!
//! ## Overview
//!
//! The daemon accepts one WebSocket connection per terminal session and
//! relays bytes between the client and a spawned shell process:
//!
//! - **Shell Resolution**: pick the host shell and I/O strategy once per
//!   process (zsh/bash + PTY or pipes on Unix, cmd.exe on Windows)
//! - **I/O Drivers**: three interchangeable strategies behind one trait
//! - **Session Control**: banner, output pump, input loop, clean teardown
//! - **Wire Protocol**: permissive JSON envelope with raw-text fallback
//!   (see the `protocol` crate)
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Server                              │
//! │            (accept loop, one task per client)              │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │   ┌───────────────┐      ┌───────────────────────────┐     │
//! │   │    Session     │◄────┤      Shell Resolver       │     │
//! │   │   Controller   │      │  (profile + strategy)    │     │
//! │   └───────┬───────┘      └───────────────────────────┘     │
//! │           │                                                │
//! │   ┌───────▼────────────────────────────────────────────┐   │
//! │   │                  ShellDriver                       │   │
//! │   │   ┌───────────┐  ┌────────────┐  ┌─────────────┐   │   │
//! │   │   │    PTY    │  │    Pipe    │  │ WindowsPipe │   │   │
//! │   │   └───────────┘  └────────────┘  └─────────────┘   │   │
//! │   └────────────────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, Server, ShellProfile, WorkspaceState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let workspace = WorkspaceState::from_process_cwd()?;
//!     let profile = ShellProfile::resolve().clone();
//!
//!     let server = Server::bind(config.bind_addr()?, profile, workspace).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`shell`]: Shell and strategy resolution
//! - [`driver`]: PTY, pipe, and Windows-pipe shell drivers
//! - [`session`]: Per-connection session controller
//! - [`server`]: WebSocket accept loop
//! - [`workspace`]: Process-wide workspace directory handle

pub mod config;
pub mod driver;
pub mod server;
pub mod session;
pub mod shell;
pub mod workspace;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export driver types for convenience
pub use driver::{DriverError, OutputReceiver, ShellDriver};

// Re-export server types for convenience
pub use server::Server;

// Re-export session types for convenience
pub use session::{Session, SessionState};

// Re-export shell types for convenience
pub use shell::{ShellProfile, Strategy};

// Re-export workspace types for convenience
pub use workspace::WorkspaceState;
