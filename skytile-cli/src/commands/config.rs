//! Print the effective configuration.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::commands::common::load_config;
use crate::error::CliError;

/// Arguments for the `config` subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config file to inspect (defaults to --config or ~/.skytile/config.ini)
    #[arg(long, value_name = "FILE")]
    pub path: Option<PathBuf>,
}

/// Run the config subcommand.
pub fn run(args: ConfigArgs, global_config: Option<&Path>) -> Result<(), CliError> {
    let explicit = args.path.as_deref().or(global_config);
    print!("{}", render(explicit)?);
    Ok(())
}

/// Header naming the source file followed by the effective INI text.
fn render(explicit: Option<&Path>) -> Result<String, CliError> {
    let (path, config) = load_config(explicit)?;
    let source = if path.exists() {
        format!("; Loaded from {}", path.display())
    } else {
        format!("; {} not found, showing defaults", path.display())
    };
    Ok(format!("{}\n\n{}", source, config.to_ini_string()))
}
