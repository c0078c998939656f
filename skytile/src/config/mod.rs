//! User configuration stored in `~/.skytile/config.ini`.
//!
//! # Example
//!
//! ```ignore
//! use skytile::config::ConfigFile;
//!
//! let file = ConfigFile::load()?;
//! let engine_config = file.engine_config();
//! ```

mod file;
mod parser;
mod writer;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    LoggingSettings, PrefetchSettings, DEFAULT_LOG_FILE,
};
