//! Prism CLI - image upload service with background processing.
//!
//! Prism accepts JPEG and PNG uploads, answers immediately with an id, and
//! normalizes, thumbnails and captions each image in the background.
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP service
//! prism serve --port 8000
//!
//! # Process one local file and print the resulting record
//! prism process photo.jpg
//!
//! # Aggregate counters from the configured store
//! prism stats
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;
mod server;

/// Prism - image upload service with background thumbnailing and captioning.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP upload and query service
    Serve(cli::serve::ServeArgs),

    /// Process a single local image and print its record
    Process(cli::process::ProcessArgs),

    /// Print aggregate processing statistics
    Stats,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = cli::load_config(cli.config.as_deref())?;
    let _log_guard = logging::init_from_config(&config, cli.verbose, cli.json_logs)?;

    tracing::debug!("Prism v{}", prism_core::VERSION);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(prism_core::Config::default_path);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(config, args).await,
        Commands::Process(args) => cli::process::execute(config, args).await,
        Commands::Stats => cli::stats::execute(config).await,
        Commands::Config(args) => cli::config::execute(config, &config_path, args).await,
    }
}
