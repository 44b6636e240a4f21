//! In-memory event log
//!
//! Bounded ring of timestamped one-line events shared between the tracking
//! loop and the serial reader thread. This is the operator-facing trail the
//! CLI can dump; it is independent of `tracing` output.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Maximum entries kept before the oldest are dropped
pub const MAX_ENTRIES: usize = 500;

/// Coarse event categories, used for display filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Gps,
    Cache,
    Here,
    Osm,
    Serial,
    Error,
    Info,
}

impl LogCategory {
    fn tag(&self) -> &'static str {
        match self {
            LogCategory::Gps => "GPS",
            LogCategory::Cache => "CACHE",
            LogCategory::Here => "HERE",
            LogCategory::Osm => "OSM",
            LogCategory::Serial => "TTL",
            LogCategory::Error => "ERROR",
            LogCategory::Info => "INFO",
        }
    }
}

/// One logged event
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub category: LogCategory,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:5} {}",
            self.at.format("%H:%M:%S%.3f"),
            self.category.tag(),
            self.message
        )
    }
}

/// Bounded event ring
#[derive(Debug, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

/// Handle shared between the tracker and the serial reader thread
pub type SharedLog = Arc<Mutex<EventLog>>;

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log wrapped for sharing across threads
    pub fn shared() -> SharedLog {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append an event, dropping the oldest entry past the cap
    pub fn add(&mut self, category: LogCategory, message: impl Into<String>) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: Utc::now(),
            category,
            message: message.into(),
        });
    }

    /// The most recent `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_at_max() {
        let mut log = EventLog::new();
        for i in 0..(MAX_ENTRIES + 25) {
            log.add(LogCategory::Info, format!("event {i}"));
        }
        assert_eq!(log.len(), MAX_ENTRIES);
        // The oldest entries are gone
        assert_eq!(log.recent(1)[0].message, format!("event {}", MAX_ENTRIES + 24));
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut log = EventLog::new();
        log.add(LogCategory::Gps, "first");
        log.add(LogCategory::Cache, "second");
        log.add(LogCategory::Serial, "third");

        let tail = log.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].message, "second");
        assert_eq!(tail[1].message, "third");
    }

    #[test]
    fn test_entry_formatting() {
        let mut log = EventLog::new();
        log.add(LogCategory::Serial, "sent 50");
        let line = log.recent(1)[0].to_string();
        assert!(line.contains("TTL"));
        assert!(line.contains("sent 50"));
    }
}
