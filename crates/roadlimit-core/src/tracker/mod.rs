//! Polling loop
//!
//! Ties the pipeline together: pull a fix, step the resolver, run the remote
//! chain when asked, push freshly found values to the TTL display, and sleep
//! whatever the outcome dictates. One task, no shared mutable state beyond
//! the event log the serial reader also writes to.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::GeoSpeedLimitClient;
use crate::demo::DriveSimulator;
use crate::limit::{LimitHit, LimitSource};
use crate::location::{GpsdSource, LocationFix};
use crate::logbook::{EventLog, LogCategory, SharedLog};
use crate::offline::OfflineLookup;
use crate::resolver::{Outcome, Resolution, Resolver, Step};
use crate::serial::TtlLink;
use crate::stats::TrackingStats;

/// How long one cycle waits for gpsd to produce a fix
pub const FIX_WAIT: Duration = Duration::from_secs(3);

/// Where location fixes come from
pub enum FixSource {
    /// Live fixes from a gpsd daemon
    Gpsd(GpsdSource),
    /// Simulated drive
    Demo {
        simulator: DriveSimulator,
        started: Instant,
    },
}

impl FixSource {
    /// Connect to gpsd at the given address
    pub async fn connect_gpsd(addr: &str) -> std::io::Result<Self> {
        Ok(Self::Gpsd(GpsdSource::connect(addr).await?))
    }

    /// Start a simulated drive
    pub fn demo(simulator: DriveSimulator) -> Self {
        Self::Demo {
            simulator,
            started: Instant::now(),
        }
    }

    /// Produce the fix for this poll cycle, `None` on GPS error
    pub async fn next_fix(&mut self) -> Option<LocationFix> {
        match self {
            FixSource::Gpsd(source) => source.next_fix(FIX_WAIT).await,
            FixSource::Demo { simulator, started } => {
                simulator.update(started.elapsed().as_millis() as u64)
            }
        }
    }
}

/// The adaptive polling loop
pub struct Tracker {
    source: FixSource,
    resolver: Resolver,
    client: GeoSpeedLimitClient,
    offline: Option<OfflineLookup>,
    link: Option<TtlLink>,
    log: SharedLog,
    session: Uuid,
}

impl Tracker {
    pub fn new(source: FixSource, client: GeoSpeedLimitClient) -> Self {
        Self {
            source,
            resolver: Resolver::new(),
            client,
            offline: None,
            link: None,
            log: EventLog::shared(),
            session: Uuid::new_v4(),
        }
    }

    /// Use a local OSM extract as the last lookup fallback
    pub fn with_offline(mut self, offline: OfflineLookup) -> Self {
        self.offline = Some(offline);
        self
    }

    /// Attach the TTL display link
    pub fn with_link(mut self, link: TtlLink) -> Self {
        self.link = Some(link);
        self
    }

    /// Share an existing event log (e.g. one the serial reader writes to)
    pub fn with_log(mut self, log: SharedLog) -> Self {
        self.log = log;
        self
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }

    pub fn stats(&self) -> TrackingStats {
        *self.resolver.stats()
    }

    /// Run one poll cycle: fix, resolution, display output
    pub async fn step(&mut self) -> Resolution {
        let fix = self.source.next_fix().await;

        let resolution = match self.resolver.begin(fix.as_ref()) {
            Step::Settled(resolution) => resolution,
            Step::NeedsRemote(request) => {
                let mut hit = self.client.lookup(&request.trace).await;
                if hit.is_none() {
                    hit = self.offline_lookup(&request.trace);
                }
                self.resolver.complete(&request, hit, Utc::now())
            }
        };

        self.record(&resolution);

        if let Some(found) = resolution.fresh_value() {
            self.push_to_display(found.speed_kmh, found.source).await;
        }

        resolution
    }

    /// Run until cancelled; returns the final session counters
    pub async fn run(&mut self, cancel: CancellationToken) -> TrackingStats {
        info!(session = %self.session, "tracking started");
        self.note(LogCategory::Info, format!("session {} started", self.session));

        while !cancel.is_cancelled() {
            let resolution = self.step().await;
            debug!(
                outcome = ?resolution.outcome,
                next_poll_secs = resolution.next_poll.as_secs(),
                "cycle complete"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(resolution.next_poll) => {}
            }
        }

        if let Some(link) = &mut self.link {
            link.close();
        }

        let stats = self.stats();
        info!(session = %self.session, %stats, "tracking stopped");
        stats
    }

    fn offline_lookup(&self, trace: &[(f64, f64)]) -> Option<LimitHit> {
        let offline = self.offline.as_ref()?;
        let &(lat, lon) = trace.first()?;

        let matched = offline.find_speed_limit(lat, lon)?;
        debug!(
            speed = matched.speed_kmh,
            road = matched.road_name.as_deref().unwrap_or("unnamed"),
            distance_m = matched.distance_m,
            "offline extract matched"
        );
        Some(LimitHit::new(matched.speed_kmh, LimitSource::Offline))
    }

    async fn push_to_display(&mut self, speed_kmh: u32, source: LimitSource) {
        let Some(link) = &self.link else {
            return;
        };

        match link.send_speed(speed_kmh).await {
            Ok(()) => {
                self.resolver.stats_mut().ttl_sends += 1;
                self.note(
                    LogCategory::Serial,
                    format!("sent {speed_kmh} ({})", source.label()),
                );
            }
            Err(err) => {
                // Serial failures never stop the loop; next cycle retries
                warn!(error = %err, "TTL send failed");
                self.note(LogCategory::Error, format!("TTL send failed: {err}"));
            }
        }
    }

    fn record(&mut self, resolution: &Resolution) {
        match resolution.outcome {
            Outcome::GpsError => self.note(LogCategory::Gps, "GPS error"),
            Outcome::LowAccuracy => self.note(LogCategory::Gps, "low accuracy fix"),
            Outcome::BuildingBuffer => {
                let size = self.resolver.stats().buffer_size;
                self.note(LogCategory::Gps, format!("building trace buffer ({size})"));
            }
            Outcome::Found => {
                if let Some(found) = resolution.display {
                    let category = match found.source {
                        LimitSource::Cache => LogCategory::Cache,
                        LimitSource::Here => LogCategory::Here,
                        LimitSource::Overpass | LimitSource::Offline => LogCategory::Osm,
                    };
                    self.note(category, format!("{} km/h ({})", found.speed_kmh, found.source));
                }
            }
            Outcome::NotFound => match resolution.display {
                Some(retained) => self.note(
                    LogCategory::Info,
                    format!("no data, retaining {} km/h", retained.speed_kmh),
                ),
                None => self.note(LogCategory::Info, "no data, nothing to retain"),
            },
        }
    }

    fn note(&self, category: LogCategory, message: impl Into<String>) {
        if let Ok(mut log) = self.log.lock() {
            log.add(category, message);
        }
    }
}
