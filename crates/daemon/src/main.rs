//! TermBridge Daemon
//!
//! WebSocket bridge between a browser terminal and a host shell.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::server::Server;
use daemon::shell::ShellProfile;
use daemon::workspace::WorkspaceState;
use tracing_subscriber::EnvFilter;

/// TermBridge - serve a host shell to browser terminal clients.
#[derive(Parser, Debug)]
#[command(name = "termbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the TermBridge daemon
    Start {
        /// Listener address (overrides the config file)
        #[arg(long, value_name = "HOST:PORT")]
        bind: Option<String>,
    },

    /// Print the shell profile this host resolves to
    Shell {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Initialize tracing; the guard must outlive main when file logging is
    // enabled.
    let _log_guard = init_tracing(&config, cli.verbose);

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Start { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let addr = config.bind_addr()?;

            let profile = shell_profile(&config);
            let workspace = WorkspaceState::from_process_cwd()?;

            tracing::info!(
                shell = %profile.name,
                strategy = %profile.strategy,
                cwd = %workspace.current().display(),
                "TermBridge daemon starting"
            );

            let server = Server::bind(addr, profile, workspace).await?;

            tokio::select! {
                result = server.run() => result?,
                _ = wait_for_shutdown_signal() => {
                    tracing::info!("Received shutdown signal");
                }
            }
        }
        Commands::Shell { json } => {
            let profile = shell_profile(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("Shell:    {}", profile.name);
                println!("Program:  {}", profile.program);
                println!("Strategy: {}", profile.strategy);
            }
        }
    }

    Ok(())
}

/// Resolves the session shell profile, honoring a config override.
fn shell_profile(config: &Config) -> ShellProfile {
    match &config.terminal.shell {
        Some(program) => ShellProfile::with_program(program),
        None => ShellProfile::resolve().clone(),
    }
}

/// Initializes the tracing subscriber, optionally teeing logs to daily
/// files when `log.directory` is configured.
fn init_tracing(
    config: &Config,
    verbose: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if verbose {
        "debug"
    } else {
        config.log.level.as_str()
    };
    let filter = EnvFilter::new(level);

    if let Some(directory) = &config.log.directory {
        let appender = tracing_appender::rolling::daily(directory, "termbridge.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
