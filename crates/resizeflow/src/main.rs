//! resizeflow CLI - event-driven image ingest pipeline.
//!
//! Each uploaded image is validated, resized to the configured target size,
//! and has its processing status recorded. Objects live under a local
//! storage root laid out as `<root>/<container>/<key>`.
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline for one object
//! resizeflow run uploads cat.jpg
//!
//! # Feed a storage-change notification file
//! resizeflow ingest event.json
//!
//! # Look up the recorded status
//! resizeflow status cat.jpg
//!
//! # View configuration
//! resizeflow config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// resizeflow - validate, resize, and record uploaded images.
#[derive(Parser, Debug)]
#[command(name = "resizeflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "RESIZEFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline for a single object
    Run(cli::run::RunArgs),

    /// Start instances from a notification file
    Ingest(cli::ingest::IngestArgs),

    /// Show the recorded status of an image
    Status(cli::status::StatusArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `resizeflow config path`."
            );
            resizeflow_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("resizeflow v{}", resizeflow_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Status(args) => cli::status::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()).await,
    }
}
