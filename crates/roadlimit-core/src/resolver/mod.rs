//! Speed limit resolution policy
//!
//! The decision core of the pipeline, kept free of I/O so it can be tested
//! as plain state: given a fix, decide between the grid cache, a remote
//! lookup, and the retained last-known value, and pick the next poll delay
//! from the outcome.
//!
//! Resolution happens in two steps. [`Resolver::begin`] settles everything
//! it can locally; when a remote lookup is needed it hands the caller a
//! [`RemoteRequest`], and the caller feeds the answer back through
//! [`Resolver::complete`].

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{grid_key, SpeedLimitCache};
use crate::limit::{LimitHit, LimitSource};
use crate::location::{LocationFix, MovementDetector, TraceBuffer};
use crate::stats::TrackingStats;

/// Fixes with worse horizontal accuracy than this are not acted on, metres
pub const ACCURACY_GATE_M: f64 = 12.0;

/// Minimum filtered trace points before the remote matcher is called
pub const MIN_TRACE_POINTS: usize = 2;

/// What a poll cycle amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No fix this cycle
    GpsError,
    /// Fix accuracy above the gate
    LowAccuracy,
    /// Not enough trace points for the matcher yet
    BuildingBuffer,
    /// A usable value came from the cache or a lookup
    Found,
    /// Every source came up empty
    NotFound,
}

/// Fixed delay before the next poll, by outcome
pub fn poll_interval(outcome: Outcome) -> Duration {
    match outcome {
        Outcome::GpsError => Duration::from_secs(5),
        Outcome::LowAccuracy => Duration::from_secs(5),
        Outcome::BuildingBuffer => Duration::from_secs(10),
        Outcome::Found => Duration::from_secs(20),
        Outcome::NotFound => Duration::from_secs(5),
    }
}

/// What the display should show after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimit {
    /// Speed limit in km/h
    pub speed_kmh: u32,
    pub source: LimitSource,
    /// True when this is the retained last-known value, not a fresh answer.
    /// Retained values are redisplayed but never re-sent to the hardware.
    pub retained: bool,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// `None` means leave the current display state untouched
    pub display: Option<ResolvedLimit>,
    pub next_poll: Duration,
}

impl Resolution {
    /// A freshly resolved value that should go out to the hardware
    pub fn fresh_value(&self) -> Option<ResolvedLimit> {
        self.display.filter(|d| !d.retained)
    }
}

/// Remote lookup the caller must perform to finish the cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    /// Grid cell the answer will be cached under
    pub key: String,
    /// Filtered GPS trace for the matcher
    pub trace: Vec<(f64, f64)>,
    /// Fix accuracy, recorded with the cached answer
    pub accuracy_m: f64,
}

/// Outcome of [`Resolver::begin`]
#[derive(Debug)]
pub enum Step {
    /// Cycle settled locally
    Settled(Resolution),
    /// Caller must run the remote chain and call [`Resolver::complete`]
    NeedsRemote(RemoteRequest),
}

/// Resolution state machine.
///
/// Owns everything the duplicated prototypes kept in module globals: the
/// trace buffer, the grid cache, the retained value and the counters.
#[derive(Debug, Default)]
pub struct Resolver {
    buffer: TraceBuffer,
    cache: SpeedLimitCache,
    movement: MovementDetector,
    last_valid: Option<(u32, LimitSource)>,
    stats: TrackingStats,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a poll cycle with the fix (or lack of one) for this cycle
    pub fn begin(&mut self, fix: Option<&LocationFix>) -> Step {
        let Some(fix) = fix else {
            return Step::Settled(self.settle(Outcome::GpsError, self.retained()));
        };

        if fix.accuracy_m > ACCURACY_GATE_M {
            return Step::Settled(self.settle(Outcome::LowAccuracy, None));
        }

        self.stats.gps_updates += 1;
        self.movement.update(fix.lat, fix.lon);
        self.buffer.push(*fix);
        self.stats.buffer_size = self.buffer.len();

        let key = grid_key(fix.lat, fix.lon);
        if let Some(hit) = self.cache.lookup(&key, fix.accuracy_m, fix.timestamp) {
            let (speed_kmh, origin) = (hit.speed_kmh, hit.source);
            self.stats.cache_hits += 1;
            self.last_valid = Some((speed_kmh, origin));
            return Step::Settled(self.settle(
                Outcome::Found,
                Some(ResolvedLimit {
                    speed_kmh,
                    source: LimitSource::Cache,
                    retained: false,
                }),
            ));
        }

        let trace = self.buffer.filtered_trace();
        if trace.len() < MIN_TRACE_POINTS {
            return Step::Settled(self.settle(Outcome::BuildingBuffer, self.retained()));
        }

        Step::NeedsRemote(RemoteRequest {
            key,
            trace,
            accuracy_m: fix.accuracy_m,
        })
    }

    /// Finish a cycle with the remote answer (or lack of one)
    pub fn complete(
        &mut self,
        request: &RemoteRequest,
        hit: Option<LimitHit>,
        now: DateTime<Utc>,
    ) -> Resolution {
        match hit {
            Some(hit) if hit.speed_kmh > 0 => {
                match hit.source {
                    LimitSource::Here => self.stats.here_hits += 1,
                    LimitSource::Overpass => self.stats.osm_hits += 1,
                    LimitSource::Offline => self.stats.offline_hits += 1,
                    // Remote lookups never answer from the cache
                    LimitSource::Cache => {}
                }
                self.cache.insert(
                    request.key.clone(),
                    hit.speed_kmh,
                    request.accuracy_m,
                    hit.source,
                    now,
                );
                self.last_valid = Some((hit.speed_kmh, hit.source));
                self.settle(
                    Outcome::Found,
                    Some(ResolvedLimit {
                        speed_kmh: hit.speed_kmh,
                        source: hit.source,
                        retained: false,
                    }),
                )
            }
            _ => {
                self.stats.null_responses += 1;
                self.settle(Outcome::NotFound, self.retained())
            }
        }
    }

    /// Session counters so far
    pub fn stats(&self) -> &TrackingStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut TrackingStats {
        &mut self.stats
    }

    /// The retained last-known value, if any
    pub fn last_valid(&self) -> Option<(u32, LimitSource)> {
        self.last_valid
    }

    pub fn is_moving(&self) -> bool {
        self.movement.is_moving()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop all session state: cache, buffer, retained value, counters
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cache.clear();
        self.last_valid = None;
        self.stats = TrackingStats::default();
    }

    fn settle(&self, outcome: Outcome, display: Option<ResolvedLimit>) -> Resolution {
        Resolution {
            outcome,
            display,
            next_poll: poll_interval(outcome),
        }
    }

    fn retained(&self) -> Option<ResolvedLimit> {
        self.last_valid.map(|(speed_kmh, source)| ResolvedLimit {
            speed_kmh,
            source,
            retained: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fix(lat: f64, lon: f64, accuracy: f64, secs: i64) -> LocationFix {
        LocationFix::new(
            lat,
            lon,
            accuracy,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    fn remote_request(resolver: &mut Resolver, secs: i64) -> RemoteRequest {
        // Two accurate fixes put the buffer past the matcher gate
        resolver.begin(Some(&fix(12.9716, 77.5946, 5.0, secs)));
        match resolver.begin(Some(&fix(12.9717, 77.5947, 5.0, secs + 5))) {
            Step::NeedsRemote(request) => request,
            other => panic!("expected remote step, got {other:?}"),
        }
    }

    #[test]
    fn test_interval_table() {
        assert_eq!(poll_interval(Outcome::GpsError), Duration::from_secs(5));
        assert_eq!(poll_interval(Outcome::LowAccuracy), Duration::from_secs(5));
        assert_eq!(poll_interval(Outcome::BuildingBuffer), Duration::from_secs(10));
        assert_eq!(poll_interval(Outcome::Found), Duration::from_secs(20));
        assert_eq!(poll_interval(Outcome::NotFound), Duration::from_secs(5));
    }

    #[test]
    fn test_no_fix_without_history() {
        let mut resolver = Resolver::new();
        let Step::Settled(resolution) = resolver.begin(None) else {
            panic!("no fix must settle locally");
        };
        assert_eq!(resolution.outcome, Outcome::GpsError);
        assert!(resolution.display.is_none());
        assert_eq!(resolution.next_poll, Duration::from_secs(5));
    }

    #[test]
    fn test_low_accuracy_fix_is_ignored() {
        let mut resolver = Resolver::new();
        let Step::Settled(resolution) = resolver.begin(Some(&fix(12.97, 77.59, 25.0, 0))) else {
            panic!("low accuracy must settle locally");
        };
        assert_eq!(resolution.outcome, Outcome::LowAccuracy);
        assert_eq!(resolver.stats().gps_updates, 0);
        assert_eq!(resolver.stats().buffer_size, 0);
    }

    #[test]
    fn test_first_fix_builds_buffer() {
        let mut resolver = Resolver::new();
        let Step::Settled(resolution) = resolver.begin(Some(&fix(12.97, 77.59, 5.0, 0))) else {
            panic!("single fix must settle locally");
        };
        assert_eq!(resolution.outcome, Outcome::BuildingBuffer);
        assert_eq!(resolution.next_poll, Duration::from_secs(10));
        assert_eq!(resolver.stats().gps_updates, 1);
    }

    #[test]
    fn test_remote_found_updates_cache_and_retained() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);

        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        let resolution = resolver.complete(
            &request,
            Some(LimitHit::new(60, LimitSource::Here)),
            now,
        );

        assert_eq!(resolution.outcome, Outcome::Found);
        assert_eq!(resolution.next_poll, Duration::from_secs(20));
        let display = resolution.fresh_value().expect("fresh value");
        assert_eq!(display.speed_kmh, 60);
        assert_eq!(display.source, LimitSource::Here);

        assert_eq!(resolver.stats().here_hits, 1);
        assert_eq!(resolver.cache_len(), 1);
        assert_eq!(resolver.last_valid(), Some((60, LimitSource::Here)));
    }

    #[test]
    fn test_cache_answers_second_visit() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        resolver.complete(&request, Some(LimitHit::new(60, LimitSource::Overpass)), now);

        // Same cell, shortly after: cache answers, no remote step
        let step = resolver.begin(Some(&fix(12.9717, 77.5947, 5.0, 20)));
        let Step::Settled(resolution) = step else {
            panic!("cache hit must settle locally");
        };
        assert_eq!(resolution.outcome, Outcome::Found);
        let display = resolution.fresh_value().unwrap();
        assert_eq!(display.speed_kmh, 60);
        assert_eq!(display.source, LimitSource::Cache);
        assert_eq!(resolver.stats().cache_hits, 1);
        // The retained value keeps the origin source, not the cache
        assert_eq!(resolver.last_valid(), Some((60, LimitSource::Overpass)));
    }

    #[test]
    fn test_remote_miss_retains_last_value() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        resolver.complete(&request, Some(LimitHit::new(50, LimitSource::Here)), now);

        // Move to a different cell, remote finds nothing
        resolver.begin(Some(&fix(12.9916, 77.6146, 5.0, 30)));
        let Step::NeedsRemote(request) = resolver.begin(Some(&fix(12.9917, 77.6147, 5.0, 35)))
        else {
            panic!("different cell must go remote");
        };
        let resolution = resolver.complete(&request, None, now);

        assert_eq!(resolution.outcome, Outcome::NotFound);
        assert_eq!(resolution.next_poll, Duration::from_secs(5));
        assert_eq!(resolver.stats().null_responses, 1);

        let display = resolution.display.expect("retained value is redisplayed");
        assert!(display.retained);
        assert_eq!(display.speed_kmh, 50);
        // Retained values are not fresh: nothing goes to the hardware
        assert!(resolution.fresh_value().is_none());
    }

    #[test]
    fn test_gps_error_redisplays_retained() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        resolver.complete(&request, Some(LimitHit::new(80, LimitSource::Here)), now);

        let Step::Settled(resolution) = resolver.begin(None) else {
            panic!();
        };
        assert_eq!(resolution.outcome, Outcome::GpsError);
        let display = resolution.display.unwrap();
        assert!(display.retained);
        assert_eq!(display.speed_kmh, 80);
        assert_eq!(display.source, LimitSource::Here);
    }

    #[test]
    fn test_zero_speed_hit_counts_as_miss() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();

        let resolution = resolver.complete(
            &request,
            Some(LimitHit::new(0, LimitSource::Overpass)),
            now,
        );
        assert_eq!(resolution.outcome, Outcome::NotFound);
        assert_eq!(resolver.stats().null_responses, 1);
        assert_eq!(resolver.cache_len(), 0);
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut resolver = Resolver::new();
        let request = remote_request(&mut resolver, 0);
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        resolver.complete(&request, Some(LimitHit::new(60, LimitSource::Here)), now);

        resolver.reset();
        assert_eq!(resolver.cache_len(), 0);
        assert_eq!(resolver.last_valid(), None);
        assert_eq!(resolver.stats(), &TrackingStats::default());
    }
}
