//! Resolved speed limit values and their provenance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a speed limit value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitSource {
    /// HERE route-match API
    Here,
    /// OSM Overpass API
    Overpass,
    /// Local OSM JSON extract
    Offline,
    /// Grid cache hit
    Cache,
}

impl LimitSource {
    /// Human readable label, used in log lines and the CLI
    pub fn label(&self) -> &'static str {
        match self {
            LimitSource::Here => "HERE Maps",
            LimitSource::Overpass => "OSM",
            LimitSource::Offline => "OSM extract",
            LimitSource::Cache => "Cache",
        }
    }
}

impl fmt::Display for LimitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A usable speed limit answer from one of the lookup sources.
///
/// Values are always km/h and always positive; lookups that cannot produce a
/// positive number return no hit at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitHit {
    /// Speed limit in km/h
    pub speed_kmh: u32,
    /// Which source answered
    pub source: LimitSource,
}

impl LimitHit {
    pub fn new(speed_kmh: u32, source: LimitSource) -> Self {
        Self { speed_kmh, source }
    }
}

impl fmt::Display for LimitHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} km/h ({})", self.speed_kmh, self.source)
    }
}
