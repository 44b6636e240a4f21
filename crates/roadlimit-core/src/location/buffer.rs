//! GPS trace buffer
//!
//! Holds the recent fixes that make up the trace sent to the route matcher.
//! The matcher wants a short, fresh, reasonably accurate trace, so the buffer
//! is bounded three ways: entry count, age, and per-fix accuracy at read
//! time.

use std::collections::VecDeque;

use chrono::Duration;

use super::LocationFix;

/// Maximum fixes retained
pub const TRACE_CAPACITY: usize = 8;

/// Fixes older than this (relative to the newest fix) are dropped on insert
pub const TRACE_WINDOW_SECS: i64 = 120;

/// Fixes with worse accuracy than this are excluded from the matcher trace
pub const TRACE_MAX_ACCURACY_M: f64 = 20.0;

/// Sliding window of recent fixes
#[derive(Debug, Default)]
pub struct TraceBuffer {
    points: VecDeque<LocationFix>,
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fix, expiring stale entries and enforcing the capacity bound
    pub fn push(&mut self, fix: LocationFix) {
        let cutoff = fix.timestamp - Duration::seconds(TRACE_WINDOW_SECS);
        self.points.retain(|p| p.timestamp >= cutoff);

        self.points.push_back(fix);
        while self.points.len() > TRACE_CAPACITY {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// The trace handed to the route matcher: accurate fixes only, in
    /// timestamp order, as (lat, lon) pairs.
    pub fn filtered_trace(&self) -> Vec<(f64, f64)> {
        let mut fixes: Vec<&LocationFix> = self
            .points
            .iter()
            .filter(|p| p.accuracy_m <= TRACE_MAX_ACCURACY_M)
            .collect();
        fixes.sort_by_key(|p| p.timestamp);
        fixes.iter().map(|p| (p.lat, p.lon)).collect()
    }
}
