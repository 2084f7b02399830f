use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "emberlog", version, about = "Incremental thermostat telemetry archiver")]
struct Cli {
    /// Configuration file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass over all registered devices
    Sync,
    /// Credential management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Show per-device sync checkpoints
    Checkpoint {
        /// Restrict output to one device name
        #[arg(long)]
        device: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sync => commands::sync::run(cli.config.as_deref()),
        Commands::Auth { action } => commands::auth::run(cli.config.as_deref(), action),
        Commands::Checkpoint { device } => {
            commands::checkpoint::run(cli.config.as_deref(), device)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
