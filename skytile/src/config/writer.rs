//! INI serialization logic for converting `ConfigFile` → INI string.

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; How long a cached tile stays fresh, in milliseconds
ttl_ms = {}
; Maximum number of tiles kept in memory
max_entries = {}

[prefetch]
; Fetch neighboring tiles in the background after each tile fetch
enabled = {}
; Quiet period before a batch of neighbor fetches starts, in milliseconds
debounce_ms = {}
; Minimum interval before the same tile can seed prefetch again, in milliseconds
cooldown_ms = {}
; Neighbors fetched per seed tile
max_per_tile = {}
; Deepest pyramid order for which child tiles are prefetched
max_order = {}

[logging]
; Directory for log files
directory = {}
; Log file name
file = {}
"#,
        config.cache.ttl_ms,
        config.cache.max_entries,
        config.prefetch.enabled,
        config.prefetch.debounce_ms,
        config.prefetch.cooldown_ms,
        config.prefetch.max_per_tile,
        config.prefetch.max_order,
        config.logging.directory.display(),
        config.logging.file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_all_sections() {
        let content = to_config_string(&ConfigFile::default());

        assert!(content.contains("[cache]"));
        assert!(content.contains("[prefetch]"));
        assert!(content.contains("[logging]"));
        assert!(content.contains("ttl_ms = 90000"));
        assert!(content.contains("enabled = true"));
    }
}
