//! SiteChat CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Start the HTTP chat gateway
//! - `check` — Validate configuration and provider wiring

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sitechat",
    about = "SiteChat — an embeddable AI chat backend for content sites",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "sitechat.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration, credentials, and the content corpus
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(&cli.config, port).await?,
        Commands::Check => commands::check::run(&cli.config).await?,
    }

    Ok(())
}
