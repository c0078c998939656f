//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = parse_number(section, "cache", "ttl_ms")? {
            config.cache.ttl_ms = v;
        }
        if let Some(v) = parse_number(section, "cache", "max_entries")? {
            config.cache.max_entries = v;
        }
    }

    // [prefetch] section
    if let Some(section) = ini.section(Some("prefetch")) {
        if let Some(v) = section.get("enabled") {
            config.prefetch.enabled = parse_bool(v).ok_or_else(|| ConfigFileError::InvalidValue {
                section: "prefetch".to_string(),
                key: "enabled".to_string(),
                value: v.to_string(),
                reason: "expected true or false".to_string(),
            })?;
        }
        if let Some(v) = parse_number(section, "prefetch", "debounce_ms")? {
            config.prefetch.debounce_ms = v;
        }
        if let Some(v) = parse_number(section, "prefetch", "cooldown_ms")? {
            config.prefetch.cooldown_ms = v;
        }
        if let Some(v) = parse_number(section, "prefetch", "max_per_tile")? {
            config.prefetch.max_per_tile = v;
        }
        if let Some(v) = parse_number(section, "prefetch", "max_order")? {
            config.prefetch.max_order = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Parse an unsigned integer key, if present.
fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section_name.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}
