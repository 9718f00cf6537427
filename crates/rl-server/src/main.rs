//! remote-lock rendezvous server
//!
//! Serves the admin HTTP API and the device channel, and holds the lock
//! state in memory for the lifetime of the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_core::auth::generate_secret;
use rl_core::config::{self, ServerConfig};
use rl_server::{server, ServerState};

#[derive(Parser)]
#[command(name = "rl-server")]
#[command(about = "remote-lock rendezvous server")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on, keeping the configured host
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Admin secret (overrides config)
    #[arg(long, env = "LOCK_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("remote-lock server starting...");

    let mut config = load_server_config(args.config.as_ref())?;
    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(port) = args.port {
        config.set_port(port);
    }

    let admin_secret = match args.secret.clone().or_else(|| config.admin_secret.clone()) {
        Some(secret) if !secret.is_empty() => secret,
        _ => {
            let secret = generate_secret();
            tracing::warn!("No admin secret configured, generated one for this run: {}", secret);
            secret
        }
    };

    if config.devices.is_empty() {
        tracing::warn!("No devices registered - every device channel will be rejected");
    } else {
        tracing::info!("Loaded {} registered device(s)", config.devices.len());
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    let state = Arc::new(ServerState::new(config, admin_secret).with_shutdown_token(cancel.clone()));

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
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

    server::serve(state).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Load the config file, falling back to defaults when none exists
fn load_server_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    match path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => load_default_config(&config::default_server_config_path()),
    }
}

/// A missing default file means defaults; a broken one is an error
fn load_default_config(default_path: &Path) -> Result<ServerConfig> {
    if default_path.exists() {
        config::load_config(default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))
    } else {
        tracing::info!("Using default configuration");
        Ok(ServerConfig::default())
    }
}
