//! Offline speed limit lookup
//!
//! Searches a local OSM extract (a saved Overpass response with geometry)
//! for the nearest maxspeed-tagged way. Last resort when both remote
//! lookups come up empty, and the backing store for the one-shot
//! online-vs-offline comparison in the CLI.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::client::{OverpassElement, OverpassResponse};
use crate::location::haversine_m;

/// Roads further away than this are not considered a match, metres
pub const MAX_SEARCH_DISTANCE_M: f64 = 100.0;

/// Errors loading an extract file
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("failed to read extract: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse extract: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A matched road from the extract
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineMatch {
    /// Speed limit in km/h
    pub speed_kmh: u32,
    pub road_name: Option<String>,
    pub road_type: Option<String>,
    /// Distance from the fix to the closest geometry node, metres
    pub distance_m: f64,
    /// Confidence banded by distance, 0.0 to 1.0
    pub confidence: f32,
}

/// Speed limit lookup over a loaded extract
#[derive(Debug)]
pub struct OfflineLookup {
    data: OverpassResponse,
}

impl OfflineLookup {
    /// Load an extract file from disk
    pub fn load(path: &Path) -> Result<Self, OfflineError> {
        let raw = fs::read_to_string(path)?;
        let data: OverpassResponse = serde_json::from_str(&raw)?;

        let lookup = Self { data };
        info!(
            path = %path.display(),
            roads = lookup.road_count(),
            with_limit = lookup.roads_with_limit(),
            "offline extract loaded"
        );
        Ok(lookup)
    }

    /// Build a lookup from an already parsed response (used by tests and the
    /// comparison command).
    pub fn from_response(data: OverpassResponse) -> Self {
        Self { data }
    }

    /// Nearest maxspeed-tagged way within [`MAX_SEARCH_DISTANCE_M`] of the
    /// coordinate.
    pub fn find_speed_limit(&self, lat: f64, lon: f64) -> Option<OfflineMatch> {
        let mut best: Option<(&OverpassElement, u32, f64)> = None;

        for element in &self.data.elements {
            let Some(speed) = element.maxspeed_kmh().filter(|s| *s > 0) else {
                continue;
            };
            if element.geometry.is_empty() {
                continue;
            }

            let closest = element
                .geometry
                .iter()
                .map(|node| haversine_m(lat, lon, node.lat, node.lon))
                .fold(f64::INFINITY, f64::min);

            if closest < MAX_SEARCH_DISTANCE_M
                && best.map_or(true, |(_, _, d)| closest < d)
            {
                best = Some((element, speed, closest));
            }
        }

        best.map(|(element, speed, distance_m)| OfflineMatch {
            speed_kmh: speed,
            road_name: element.tags.get("name").cloned(),
            road_type: element.tags.get("highway").cloned(),
            distance_m,
            confidence: confidence_for(distance_m),
        })
    }

    /// Total elements in the extract
    pub fn road_count(&self) -> usize {
        self.data.elements.len()
    }

    /// Elements carrying a maxspeed tag
    pub fn roads_with_limit(&self) -> usize {
        self.data
            .elements
            .iter()
            .filter(|e| e.tags.contains_key("maxspeed"))
            .count()
    }
}

/// Closer roads get higher confidence
fn confidence_for(distance_m: f64) -> f32 {
    match distance_m {
        d if d <= 10.0 => 0.95,
        d if d <= 25.0 => 0.85,
        d if d <= 50.0 => 0.70,
        d if d <= 100.0 => 0.50,
        _ => 0.20,
    }
}
