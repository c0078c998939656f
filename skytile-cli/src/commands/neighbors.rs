//! List the prefetch neighbors of a tile.

use clap::Args;
use skytile::address::{neighbors, DEFAULT_MAX_ORDER};

use crate::commands::common::parse_tile;
use crate::error::CliError;

/// Arguments for the `neighbors` subcommand.
#[derive(Debug, Args)]
pub struct NeighborsArgs {
    /// Tile URL (e.g. https://server/survey/Norder3/Dir0/Npix42.jpg)
    pub url: String,

    /// Deepest order for which children are listed
    #[arg(long, default_value_t = DEFAULT_MAX_ORDER)]
    pub max_order: u32,
}

/// Run the neighbors subcommand.
pub fn run(args: NeighborsArgs) -> Result<(), CliError> {
    for url in neighbor_urls(&args.url, args.max_order)? {
        println!("{}", url);
    }
    Ok(())
}

fn neighbor_urls(url: &str, max_order: u32) -> Result<Vec<String>, CliError> {
    let seed = parse_tile(url)?;
    Ok(neighbors(&seed, max_order)
        .iter()
        .map(|tile| tile.to_url())
        .collect())
}
