//! Location handling
//!
//! Fix representation, distance math, movement detection and the trace
//! buffer feeding the route matcher.

mod buffer;
pub mod gpsd;

pub use buffer::{TraceBuffer, TRACE_CAPACITY, TRACE_MAX_ACCURACY_M, TRACE_WINDOW_SECS};
pub use gpsd::GpsdSource;

use chrono::{DateTime, Utc};

/// Movement threshold between consecutive fixes, in metres
pub const MOVEMENT_THRESHOLD_M: f64 = 5.0;

/// Mean Earth radius in metres
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single GPS fix.
///
/// Produced by a fix source (gpsd or the drive simulator) and read-only to
/// the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    /// Estimated horizontal accuracy in metres
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(lat: f64, lon: f64, accuracy_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            accuracy_m,
            timestamp,
        }
    }

    /// Great-circle distance to another fix, in metres
    pub fn distance_to(&self, other: &LocationFix) -> f64 {
        haversine_m(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Haversine distance between two coordinates, in metres
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Tracks whether the receiver is moving between fixes.
///
/// Purely observational; feeds the session statistics, never the resolution
/// policy.
#[derive(Debug, Default)]
pub struct MovementDetector {
    last: Option<(f64, f64)>,
    moving: bool,
}

impl MovementDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fix and return the distance moved since the previous one
    pub fn update(&mut self, lat: f64, lon: f64) -> f64 {
        let moved = match self.last {
            Some((last_lat, last_lon)) => haversine_m(last_lat, last_lon, lat, lon),
            None => 0.0,
        };
        self.last = Some((lat, lon));
        self.moving = moved > MOVEMENT_THRESHOLD_M;
        moved
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine_m(12.9716, 77.5946, 12.9716, 77.5946) < 1e-6);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is ~111.2 km
        let d = haversine_m(12.0, 77.0, 13.0, 77.0);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn test_movement_detector_threshold() {
        let mut detector = MovementDetector::new();

        detector.update(12.97160, 77.59460);
        assert!(!detector.is_moving(), "first fix has no history");

        // ~1m east: still
        detector.update(12.97160, 77.59461);
        assert!(!detector.is_moving());

        // ~110m north: moving
        detector.update(12.97260, 77.59461);
        assert!(detector.is_moving());
    }
}
