//! IronQuill CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Start the streaming gateway
//! - `doctor` — Diagnose config, provider, and memory health
//! - `usage`  — Usage totals from a running gateway, or local pricing
//! - `config` — Show the effective config or write a starter file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ironquill",
    about = "IronQuill — streaming chat gateway",
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
    /// Start the gateway server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve the scripted demo provider instead of a live one
        #[arg(long)]
        scripted: bool,
    },

    /// Diagnose configuration, provider, and memory health
    Doctor,

    /// Show usage totals from a running gateway
    Usage {
        /// Gateway base URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,

        /// Print the local model pricing table instead
        #[arg(long)]
        pricing: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML (secrets redacted)
    Show,
    /// Write a starter config.toml if none exists
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: RUST_LOG wins, then --verbose, then info.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port, scripted } => commands::serve::run(port, scripted).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Usage { url, pricing } => commands::usage::run(url, pricing).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
