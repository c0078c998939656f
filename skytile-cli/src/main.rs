//! Skytile CLI - Command-line interface
//!
//! Drives the skytile engine against a live HiPS tile server and inspects
//! configuration and tile neighborhoods.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skytile::logging::init_logging;

use commands::{config, fetch, neighbors};
use error::CliError;

#[derive(Parser)]
#[command(name = "skytile")]
#[command(about = "Tile cache and predictive prefetch for HiPS sky surveys", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.skytile/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tiles through the cache and report what the engine did
    Fetch(fetch::FetchArgs),

    /// Print the neighbor URLs the prefetcher would fetch for a tile
    Neighbors(neighbors::NeighborsArgs),

    /// Print the effective configuration
    Config(config::ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Fetch(args) => {
            let (_, file) = commands::common::load_config(cli.config.as_deref())?;
            let _logging_guard =
                init_logging(&file.logging.directory, &file.logging.file, cli.verbose)
                    .map_err(|e| CliError::LoggingInit(e.to_string()))?;
            fetch::run(args, &file)
        }
        Commands::Neighbors(args) => neighbors::run(args),
        Commands::Config(args) => config::run(args, cli.config.as_deref()),
    }
}
