//! VoltDesk CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a default config file and model directory
//! - `serve`    — Start the HTTP gateway
//! - `migrate`  — Create or update the database schema
//! - `doctor`   — Diagnose configuration and data files

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "voltdesk",
    about = "VoltDesk — EV fleet diagnostics and support backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default voltdesk.toml and create the model directory
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or update the database schema
    Migrate,

    /// Diagnose configuration and data files
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
