//! Speed limit cache
//!
//! In-memory map from a coarse spatial grid cell to the last speed limit
//! resolved there. A cell is the coordinate rounded to three decimal places,
//! roughly a 100 m square, which is plenty for "am I still on the same
//! road" purposes.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::limit::LimitSource;

/// Maximum entries before the oldest is evicted
pub const MAX_ENTRIES: usize = 100;

/// Entries older than this are treated as absent
pub const ENTRY_TTL_SECS: i64 = 300;

/// A cached entry is only trusted if it was captured at an accuracy no worse
/// than the current fix accuracy plus this slack, in metres.
pub const ACCURACY_SLACK_M: f64 = 5.0;

/// Grid cell key for a coordinate: both axes rounded to 3 decimals (~100 m)
pub fn grid_key(lat: f64, lon: f64) -> String {
    let grid_lat = (lat * 1000.0).round() / 1000.0;
    let grid_lon = (lon * 1000.0).round() / 1000.0;
    format!("{grid_lat:.3},{grid_lon:.3}")
}

/// One cached speed limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedLimit {
    /// Speed limit in km/h
    pub speed_kmh: u32,
    /// When the value was resolved
    pub captured: DateTime<Utc>,
    /// Fix accuracy at capture time, metres
    pub accuracy_m: f64,
    /// Which lookup produced the value
    pub source: LimitSource,
}

/// Grid-keyed cache with TTL and size-bound eviction
#[derive(Debug, Default)]
pub struct SpeedLimitCache {
    entries: HashMap<String, CachedLimit>,
}

impl SpeedLimitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a trusted entry for a grid cell.
    ///
    /// An entry is returned only if it is younger than the TTL and was
    /// captured at an accuracy comparable to the current fix.
    pub fn lookup(
        &self,
        key: &str,
        current_accuracy_m: f64,
        now: DateTime<Utc>,
    ) -> Option<&CachedLimit> {
        let entry = self.entries.get(key)?;

        let age = now - entry.captured;
        if age > Duration::seconds(ENTRY_TTL_SECS) {
            return None;
        }
        if entry.accuracy_m > current_accuracy_m + ACCURACY_SLACK_M {
            return None;
        }
        Some(entry)
    }

    /// Store a resolved value, evicting the globally oldest entry when the
    /// size bound is exceeded.
    pub fn insert(
        &mut self,
        key: String,
        speed_kmh: u32,
        accuracy_m: f64,
        source: LimitSource,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            key,
            CachedLimit {
                speed_kmh,
                captured: now,
                accuracy_m,
                source,
            },
        );

        while self.entries.len() > MAX_ENTRIES {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.captured)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
