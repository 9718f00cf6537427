//! rlctl: remote-lock admin CLI
//!
//! Talks to the server's HTTP control surface to read and change the lock
//! state.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_cli::client::LockClient;
use rl_cli::commands;
use rl_cli::output::print_warning;

#[derive(Parser)]
#[command(name = "rlctl")]
#[command(author, version, about = "remote-lock admin client")]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL
    #[arg(
        short,
        long,
        global = true,
        env = "LOCK_SERVER",
        default_value = "http://localhost:8000"
    )]
    server: String,

    /// Admin secret for lock, unlock, message and devices
    #[arg(long, global = true, env = "LOCK_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current lock state
    Status {
        /// Print the raw JSON state
        #[arg(long)]
        json: bool,
    },

    /// Lock every device
    Lock {
        /// Message shown on the lock surface
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Unlock every device
    Unlock,

    /// Replace the lock message without locking
    Message {
        /// New lock message
        text: String,
    },

    /// List connected devices
    #[command(alias = "ls")]
    Devices {
        /// Include channels that have not authenticated yet
        #[arg(short, long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let needs_secret = !matches!(cli.command, Commands::Status { .. });
    if needs_secret && !cli.quiet && sends_secret_in_clear(&cli.server) {
        print_warning(&format!(
            "Sending the admin secret to {} over plain HTTP",
            cli.server
        ));
    }

    let client = LockClient::new(&cli.server, cli.secret)?;
    tracing::debug!("Using server {}", client.base_url());

    match cli.command {
        Commands::Status { json } => commands::status_command(&client, json).await,
        Commands::Lock { message } => commands::lock_command(&client, message).await,
        Commands::Unlock => commands::unlock_command(&client).await,
        Commands::Message { text } => commands::message_command(&client, &text).await,
        Commands::Devices { all } => commands::devices_command(&client, all).await,
    }
}

/// Plain HTTP to anything other than the local machine
fn sends_secret_in_clear(server: &str) -> bool {
    match server.strip_prefix("http://") {
        Some(rest) => !["localhost", "127.0.0.1", "[::1]"]
            .iter()
            .any(|local| rest.starts_with(local)),
        None => false,
    }
}
