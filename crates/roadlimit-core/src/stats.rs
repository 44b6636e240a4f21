//! Tracking statistics
//!
//! Plain observational counters for a tracking session. No invariants; the
//! numbers exist so the operator can see what the pipeline has been doing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters accumulated over one tracking session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStats {
    /// Usable GPS fixes received
    pub gps_updates: u64,
    /// Resolutions answered from the grid cache
    pub cache_hits: u64,
    /// Resolutions answered by HERE route matching
    pub here_hits: u64,
    /// Resolutions answered by OSM Overpass
    pub osm_hits: u64,
    /// Resolutions answered by the local OSM extract
    pub offline_hits: u64,
    /// Lookups that produced no usable value
    pub null_responses: u64,
    /// Bytes successfully written to the TTL display
    pub ttl_sends: u64,
    /// Current number of fixes in the trace buffer
    pub buffer_size: usize,
}

impl fmt::Display for TrackingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gps={} cache={} here={} osm={} offline={} null={} ttl={} buffer={}",
            self.gps_updates,
            self.cache_hits,
            self.here_hits,
            self.osm_hits,
            self.offline_hits,
            self.null_responses,
            self.ttl_sends,
            self.buffer_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_summary() {
        let stats = TrackingStats {
            gps_updates: 12,
            cache_hits: 3,
            ..Default::default()
        };
        let line = stats.to_string();
        assert!(line.contains("gps=12"));
        assert!(line.contains("cache=3"));
    }
}
