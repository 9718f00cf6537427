//! remote-lock device agent
//!
//! Follows the server's lock state and raises the lock surface when the
//! device is locked. The lock surface runs on the main thread; networking
//! runs on a background tokio runtime.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_agent::ui::{self, ConsoleSurface};
use rl_agent::{run_agent, ConnectionError};
use rl_core::config::{self, AgentConfig};
use rl_core::types::Transport;

#[derive(Parser)]
#[command(name = "rl-agent")]
#[command(about = "remote-lock device agent")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long, global = true)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the lock state (default)
    Run {
        /// Server URL (overrides config)
        #[arg(short, long, env = "LOCK_SERVER")]
        server: Option<String>,

        /// Transport: push or poll (overrides config)
        #[arg(short, long)]
        transport: Option<Transport>,

        /// Log host lock/unlock instead of executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the device credential to the agent config
    Init {
        /// Server URL
        #[arg(short, long)]
        server: String,

        /// Device identity issued by the server operator
        #[arg(short, long)]
        device_id: String,

        /// Shared secret issued with the device identity
        #[arg(long, env = "LOCK_DEVICE_SECRET", hide_env_values = true)]
        secret: String,

        /// Transport to use
        #[arg(short, long, default_value = "push")]
        transport: Transport,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_agent_config_path);

    match args.command.unwrap_or(Command::Run {
        server: None,
        transport: None,
        dry_run: false,
    }) {
        Command::Init {
            server,
            device_id,
            secret,
            transport,
            force,
        } => init(&config_path, server, device_id, secret, transport, force),
        Command::Run {
            server,
            transport,
            dry_run,
        } => {
            let mut config = load_agent_config(&config_path)?;
            if let Some(server) = server {
                config.server_url = server;
            }
            if let Some(transport) = transport {
                config.transport = transport;
            }
            config.dry_run |= dry_run;
            run(config)
        }
    }
}

fn init(
    path: &Path,
    server: String,
    device_id: String,
    secret: String,
    transport: Transport,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file {:?} already exists. Use --force to overwrite it.",
            path
        );
    }

    let config = AgentConfig {
        server_url: server,
        device_id,
        secret,
        transport,
        ..AgentConfig::default()
    };
    config.credential().context("Invalid device credential")?;
    config.validate().context("Invalid agent config")?;

    config::save_config_private(path, &config)
        .with_context(|| format!("Failed to write config to {:?}", path))?;
    println!("Wrote agent config to {}", path.display());
    Ok(())
}

fn run(config: AgentConfig) -> Result<()> {
    tracing::info!("remote-lock agent starting...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("rl-agent-worker")
        .build()
        .context("Failed to start async runtime")?;

    let cancel = CancellationToken::new();
    let (ui_handle, pump) = ui::channel();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    runtime.spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let worker = runtime.spawn(run_agent(config, ui_handle, cancel));

    // Blocks until the worker drops its UI handle
    let mut surface = ConsoleSurface::stderr();
    pump.run_blocking(&mut surface);

    let result = runtime
        .block_on(worker)
        .context("Agent task panicked")?;

    match result {
        Ok(()) => {
            tracing::info!("Agent shutdown complete");
            Ok(())
        }
        Err(ConnectionError::AuthRejected(reason)) => Err(anyhow::anyhow!(
            "The server rejected this device ({}). Check device_id and secret in the agent config.",
            reason
        )),
        Err(e) => Err(e).context("Agent failed"),
    }
}

/// Load the config file, falling back to defaults when none exists
fn load_agent_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let config: AgentConfig = config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {:?}", path))?;
        Ok(config)
    } else {
        tracing::info!("No config at {:?}, using defaults", path);
        Ok(AgentConfig::default())
    }
}
