//! Common utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use skytile::config::{config_file_path, ConfigFile};
use skytile::TileAddress;

use crate::error::CliError;

/// Resolve the config file path, preferring an explicit `--config`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

/// Load the config file, falling back to defaults when it doesn't exist.
pub fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, ConfigFile), CliError> {
    let path = resolve_config_path(explicit);
    let config = ConfigFile::load_from(&path)?;
    Ok((path, config))
}

/// Parse a tile URL or report why it isn't one.
pub fn parse_tile(url: &str) -> Result<TileAddress, CliError> {
    TileAddress::parse(url).map_err(|error| CliError::Address {
        url: url.to_string(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/custom.ini")));
        assert_eq!(path, PathBuf::from("/tmp/custom.ini"));
    }

    #[test]
    fn test_default_path() {
        assert_eq!(resolve_config_path(None), config_file_path());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.ini");

        let (resolved, config) = load_config(Some(&path)).unwrap();

        assert_eq!(resolved, path);
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_invalid_file_is_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[prefetch]\nmax_per_tile = many\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::ConfigFile(_)));
    }

    #[test]
    fn test_parse_tile() {
        let tile = parse_tile("https://example.org/hips/Norder3/Dir0/Npix42.jpg").unwrap();
        assert_eq!(tile.order(), 3);
        assert_eq!(tile.pixel(), 42);

        let err = parse_tile("https://example.org/index.html").unwrap_err();
        assert!(matches!(err, CliError::Address { .. }));
    }
}
