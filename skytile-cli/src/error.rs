//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use skytile::config::ConfigFileError;
use skytile::{AddressError, FetchError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Invalid command-line configuration
    Config(String),
    /// URL is not a HiPS tile
    Address { url: String, error: AddressError },
    /// Transport failure while fetching
    Fetch { url: String, error: FetchError },
    /// Failed to build the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Address { .. } => {
                eprintln!();
                eprintln!("Tile URLs look like:");
                eprintln!("  https://<server>/<survey>/Norder<k>/Dir<d>/Npix<n>.<jpg|png|webp>");
            }
            CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Check the file with: skytile config");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Address { url, error } => write!(f, "'{}' is not a tile URL: {}", url, error),
            CliError::Fetch { url, error } => write!(f, "Failed to fetch '{}': {}", url, error),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Address { error, .. } => Some(error),
            CliError::Fetch { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}
