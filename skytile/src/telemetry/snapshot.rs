//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// An immutable copy of the engine counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// How long the metrics have been collected
    pub uptime: Duration,

    // === Request path ===
    pub pass_throughs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub coalesced: u64,

    // === Origin fetches ===
    pub origin_fetches: u64,
    pub origin_failures: u64,
    pub bytes_fetched: u64,
    pub responses_stored: u64,
    pub admission_rejections: u64,
    pub late_results_discarded: u64,

    // === Prefetch ===
    pub seeds_cooled_down: u64,
    pub prefetch_batches: u64,
    pub prefetch_issued: u64,
    pub prefetch_stored: u64,
    pub prefetch_failed: u64,
    pub prefetch_skipped: u64,
}

impl TelemetrySnapshot {
    /// Returns the cache hit rate (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Returns the coalescing rate (0.0 - 1.0).
    ///
    /// Ratio of coalesced requests to cache misses.
    pub fn coalescing_rate(&self) -> f64 {
        if self.cache_misses == 0 {
            0.0
        } else {
            self.coalesced as f64 / self.cache_misses as f64
        }
    }

    /// Returns total bytes fetched in human-readable format.
    pub fn bytes_fetched_human(&self) -> String {
        format_bytes(self.bytes_fetched)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tile Engine Telemetry (uptime: {:.1}s)", self.uptime.as_secs_f64())?;
        writeln!(f, "─────────────────────────────────────────")?;

        writeln!(f, "Requests:")?;
        writeln!(
            f,
            "  Cache: {:.1}% hit rate ({} hits, {} misses)",
            self.cache_hit_rate() * 100.0,
            self.cache_hits,
            self.cache_misses
        )?;
        writeln!(f, "  Coalesced: {}", self.coalesced)?;
        writeln!(f, "  Pass-through: {}", self.pass_throughs)?;
        writeln!(f)?;

        writeln!(f, "Origin:")?;
        writeln!(
            f,
            "  Fetches: {} ({} failed)",
            self.origin_fetches, self.origin_failures
        )?;
        writeln!(f, "  Received: {}", self.bytes_fetched_human())?;
        writeln!(
            f,
            "  Stored: {} (rejected {})",
            self.responses_stored, self.admission_rejections
        )?;
        writeln!(f)?;

        writeln!(f, "Prefetch:")?;
        writeln!(
            f,
            "  Batches: {} (cooled-down seeds {})",
            self.prefetch_batches, self.seeds_cooled_down
        )?;
        writeln!(
            f,
            "  Issued: {}, stored: {}, failed: {}, skipped: {}",
            self.prefetch_issued, self.prefetch_stored, self.prefetch_failed, self.prefetch_skipped
        )?;

        Ok(())
    }
}

/// Format bytes in human-readable form.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let snapshot = TelemetrySnapshot {
            cache_hits: 3,
            cache_misses: 1,
            ..Default::default()
        };
        assert!((snapshot.cache_hit_rate() - 0.75).abs() < 0.001);
        assert_eq!(TelemetrySnapshot::default().cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1_500), "1.5 KB");
        assert_eq!(format_bytes(2_500_000), "2.5 MB");
    }

    #[test]
    fn test_display_mentions_sections() {
        let text = TelemetrySnapshot::default().to_string();
        assert!(text.contains("Requests:"));
        assert!(text.contains("Origin:"));
        assert!(text.contains("Prefetch:"));
    }
}
