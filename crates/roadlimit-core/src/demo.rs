//! Demo mode - simulated GPS drive
//!
//! Generates a plausible drive for exercising the whole pipeline without a
//! GPS receiver: the position advances along a slowly wandering bearing,
//! accuracy fluctuates, and the signal occasionally degrades or drops out
//! entirely so every resolver path gets hit.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::location::LocationFix;

/// Default starting point (Bengaluru)
pub const DEFAULT_START: (f64, f64) = (12.9716, 77.5946);

/// Metres per degree of latitude
const METERS_PER_DEG_LAT: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DriveState {
    /// Normal driving, good signal
    Cruising { until_ms: u64 },
    /// Stopped at a light, position barely moves
    Stopped { until_ms: u64 },
    /// Urban canyon, accuracy degraded
    Degraded { until_ms: u64 },
    /// No fixes at all
    Dropout { until_ms: u64 },
}

/// Simulated GPS receiver on a drive
pub struct DriveSimulator {
    rng: StdRng,
    lat: f64,
    lon: f64,
    heading_deg: f64,
    speed_mps: f64,
    state: DriveState,
    last_update_ms: u64,
}

impl DriveSimulator {
    /// Start a drive at the default location
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START.0, DEFAULT_START.1)
    }

    /// Start a drive at a specific location
    pub fn starting_at(lat: f64, lon: f64) -> Self {
        Self::with_rng(lat, lon, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(DEFAULT_START.0, DEFAULT_START.1, StdRng::seed_from_u64(seed))
    }

    fn with_rng(lat: f64, lon: f64, mut rng: StdRng) -> Self {
        let heading = rng.gen_range(0.0..360.0);
        let first_leg = rng.gen_range(20_000..45_000);
        Self {
            rng,
            lat,
            lon,
            heading_deg: heading,
            speed_mps: 11.0,
            state: DriveState::Cruising { until_ms: first_leg },
            last_update_ms: 0,
        }
    }

    /// Advance the drive and produce the current fix.
    ///
    /// `elapsed_ms` is time since the simulation started. Returns `None`
    /// during a signal dropout.
    pub fn update(&mut self, elapsed_ms: u64) -> Option<LocationFix> {
        let delta_ms = elapsed_ms.saturating_sub(self.last_update_ms);
        self.last_update_ms = elapsed_ms;

        self.advance_state(elapsed_ms);
        self.advance_position(delta_ms);

        let accuracy_m = match self.state {
            DriveState::Dropout { .. } => return None,
            DriveState::Degraded { .. } => self.rng.gen_range(15.0..35.0),
            _ => self.rng.gen_range(3.0..9.0),
        };

        Some(LocationFix::new(self.lat, self.lon, accuracy_m, Utc::now()))
    }

    fn advance_state(&mut self, elapsed_ms: u64) {
        let expired = match self.state {
            DriveState::Cruising { until_ms }
            | DriveState::Stopped { until_ms }
            | DriveState::Degraded { until_ms }
            | DriveState::Dropout { until_ms } => elapsed_ms >= until_ms,
        };
        if !expired {
            return;
        }

        self.state = match self.state {
            DriveState::Cruising { .. } => {
                // Mostly keep cruising; sometimes stop, lose accuracy or drop out
                match self.rng.gen_range(0..10) {
                    0..=5 => {
                        self.heading_deg =
                            (self.heading_deg + self.rng.gen_range(-60.0..60.0)).rem_euclid(360.0);
                        self.speed_mps = self.rng.gen_range(6.0..18.0);
                        DriveState::Cruising {
                            until_ms: elapsed_ms + self.rng.gen_range(20_000..45_000),
                        }
                    }
                    6 | 7 => DriveState::Stopped {
                        until_ms: elapsed_ms + self.rng.gen_range(5_000..15_000),
                    },
                    8 => DriveState::Degraded {
                        until_ms: elapsed_ms + self.rng.gen_range(10_000..25_000),
                    },
                    _ => DriveState::Dropout {
                        until_ms: elapsed_ms + self.rng.gen_range(3_000..8_000),
                    },
                }
            }
            _ => {
                // Every detour ends back in normal driving
                self.speed_mps = self.rng.gen_range(6.0..18.0);
                DriveState::Cruising {
                    until_ms: elapsed_ms + self.rng.gen_range(20_000..45_000),
                }
            }
        };
    }

    fn advance_position(&mut self, delta_ms: u64) {
        let speed = match self.state {
            DriveState::Stopped { .. } => 0.0,
            _ => self.speed_mps,
        };
        let distance_m = speed * (delta_ms as f64 / 1000.0);
        let heading = self.heading_deg.to_radians();

        self.lat += distance_m * heading.cos() / METERS_PER_DEG_LAT;
        self.lon += distance_m * heading.sin() / (METERS_PER_DEG_LAT * self.lat.to_radians().cos());
    }
}

impl Default for DriveSimulator {
    fn default() -> Self {
        Self::new()
    }
}
