//! Configuration file handling for ~/.skytile/config.ini.
//!
//! Loads and saves user configuration with defaults matching
//! [`EngineConfig`]. Parsing lives in [`super::parser`], serialization in
//! [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::engine::EngineConfig;
use crate::prefetch::{
    DEFAULT_MAX_ORDER, DEFAULT_MAX_PREFETCH_PER_TILE, DEFAULT_PREFETCH_COOLDOWN,
    DEFAULT_PREFETCH_DEBOUNCE,
};

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "skytile.log";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// `[prefetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchSettings {
    pub enabled: bool,
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
    pub max_per_tile: usize,
    pub max_order: u32,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: DEFAULT_PREFETCH_DEBOUNCE.as_millis() as u64,
            cooldown_ms: DEFAULT_PREFETCH_COOLDOWN.as_millis() as u64,
            max_per_tile: DEFAULT_MAX_PREFETCH_PER_TILE,
            max_order: DEFAULT_MAX_ORDER,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub prefetch: PrefetchSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.skytile/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.skytile/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_ini_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render as the commented INI text written by [`save_to`](Self::save_to).
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Engine settings described by this file.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_ttl(Duration::from_millis(self.cache.ttl_ms))
            .with_max_entries(self.cache.max_entries)
            .with_prefetch_enabled(self.prefetch.enabled)
            .with_prefetch_debounce(Duration::from_millis(self.prefetch.debounce_ms))
            .with_prefetch_cooldown(Duration::from_millis(self.prefetch.cooldown_ms))
            .with_max_prefetch_per_tile(self.prefetch.max_per_tile)
            .with_max_order(self.prefetch.max_order)
    }
}

/// Get the path to the config directory (~/.skytile).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skytile")
}

/// Get the path to the config file (~/.skytile/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
