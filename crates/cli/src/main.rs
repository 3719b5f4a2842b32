//! ShopChat CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Validate startup, then run the HTTP gateway
//! - `chat`     — Interactive terminal chat
//! - `metrics`  — Show the aggregate metrics summary
//! - `pricing`  — List built-in model prices
//! - `config`   — Print the effective configuration
//! - `doctor`   — Run every startup check and report

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod startup;

#[derive(Parser)]
#[command(
    name = "shopchat",
    about = "ShopChat — retrieval-augmented support chat",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.shopchat/config.toml)
    #[arg(short, long, global = true, env = "SHOPCHAT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat in the terminal
    Chat {
        /// Resume a session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show aggregate metrics
    Metrics {
        /// Print the raw JSON summary
        #[arg(long)]
        json: bool,
    },

    /// List built-in model pricing
    Pricing,

    /// Print the effective configuration as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },

    /// Diagnose configuration and collaborators
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Chat { session } => commands::chat::run(config, session).await?,
        Commands::Metrics { json } => commands::metrics::run(config, json).await?,
        Commands::Pricing => commands::pricing::run(config)?,
        Commands::Config { defaults } => commands::config::run(config, defaults)?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
