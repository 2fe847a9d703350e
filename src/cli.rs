/// # portals CLI Interface (Module)
///
/// Command parsing and routing for the `portals` binary. Everything that moves
/// data lives in `portals-core`; this module only loads the configuration and
/// hands it to the matching command in [`crate::daemon`].
///
/// ## Commands
/// - `run`: poll every portal and ingest new tarballs until Ctrl-C
/// - `parse-config` (`parse`): load and validate a configuration, print it with secrets redacted
/// - `list-files` (`ls`): print the objects in every data and status bucket
/// - `ping`: write a `PING` object to every status bucket every 30 seconds
///
/// ## Extending
/// When adding a subcommand, add a variant to [`Commands`] and keep the work
/// itself in `portals-core` or [`crate::daemon`].
use crate::daemon;
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for portals: ingest tarballs dropped into object storage.
#[derive(Parser)]
#[clap(
    name = "portals",
    version,
    about = "Watch object-storage buckets and ingest the tarballs dropped there into publishing repositories"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ingestion daemon using the given config file
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Parse and validate the config file, then print it
    #[clap(alias = "parse")]
    ParseConfig {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// List the objects in every data and status bucket
    #[clap(alias = "ls")]
    ListFiles {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Periodically write a PING object to every status bucket
    Ping {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Async CLI entrypoint, shared by main() and the integration tests
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "run", "Starting ingestion daemon");
            daemon::serve(&config).await
        }
        Commands::ParseConfig { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "parse-config", "Configuration is valid");
            println!("{config:#?}");
            Ok(())
        }
        Commands::ListFiles { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "list-files", "Listing buckets");
            daemon::list_files(&config).await
        }
        Commands::Ping { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "ping", "Starting ping loops");
            daemon::ping(&config).await
        }
    }
}
