//! # RoadLimit Core Library
//!
//! Core functionality for the RoadLimit speed limit resolver.
//!
//! This library provides:
//! - Location fix handling (gpsd client, trace buffering, simulated drives)
//! - Speed limit resolution against HERE route matching and OSM Overpass
//! - A grid-keyed in-memory speed limit cache
//! - USB-serial ("TTL") output of the resolved value to an external display
//! - The adaptive polling loop tying the pipeline together
//!
//! ## Example
//!
//! ```rust,ignore
//! use roadlimit_core::prelude::*;
//!
//! let config = AppConfig::load(None)?;
//! let client = GeoSpeedLimitClient::new(&config)?;
//! let source = FixSource::connect_gpsd(&config.gpsd_addr).await?;
//! let mut tracker = Tracker::new(source, client);
//! tracker.run(cancel_token).await;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod demo;
pub mod limit;
pub mod location;
pub mod logbook;
pub mod offline;
pub mod resolver;
pub mod serial;
pub mod stats;
pub mod tracker;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::SpeedLimitCache;
    pub use crate::client::GeoSpeedLimitClient;
    pub use crate::config::AppConfig;
    pub use crate::limit::{LimitHit, LimitSource};
    pub use crate::location::{LocationFix, TraceBuffer};
    pub use crate::logbook::{EventLog, LogCategory};
    pub use crate::offline::OfflineLookup;
    pub use crate::resolver::{Outcome, Resolution, Resolver};
    pub use crate::serial::TtlLink;
    pub use crate::stats::TrackingStats;
    pub use crate::tracker::{FixSource, Tracker};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
