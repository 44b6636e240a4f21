//! End-to-end pipeline tests on a simulated drive.
//!
//! The remote endpoints point at a closed local port so every "online"
//! lookup fails fast; the offline extract then decides whether a cycle
//! finds a value or falls through to the retained state.

use roadlimit_core::client::{GeoSpeedLimitClient, OverpassResponse};
use roadlimit_core::config::AppConfig;
use roadlimit_core::demo::{DriveSimulator, DEFAULT_START};
use roadlimit_core::limit::LimitSource;
use roadlimit_core::offline::OfflineLookup;
use roadlimit_core::resolver::Outcome;
use roadlimit_core::tracker::{FixSource, Tracker};

/// Nothing listens on the discard port of localhost in the test environment
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9/api/interpreter";

fn offline_client() -> GeoSpeedLimitClient {
    let mut config = AppConfig::default();
    config.overpass.endpoint = DEAD_ENDPOINT.to_string();
    config.here.client_id.clear();
    config.here.client_secret.clear();
    GeoSpeedLimitClient::new(&config).expect("client builds without credentials")
}

fn extract_at_start() -> OfflineLookup {
    let (lat, lon) = DEFAULT_START;
    let data: OverpassResponse = serde_json::from_str(&format!(
        r#"{{"elements":[{{"id":1,
            "tags":{{"maxspeed":"50","name":"MG Road","highway":"primary"}},
            "geometry":[{{"lat":{lat},"lon":{lon}}}]}}]}}"#
    ))
    .unwrap();
    OfflineLookup::from_response(data)
}

#[tokio::test]
async fn drive_resolves_from_extract_then_cache() {
    let source = FixSource::demo(DriveSimulator::seeded(3));
    let mut tracker = Tracker::new(source, offline_client()).with_offline(extract_at_start());

    // First cycle only seeds the trace buffer
    let first = tracker.step().await;
    assert_eq!(first.outcome, Outcome::BuildingBuffer);

    // Second cycle goes remote, online fails, the extract answers
    let second = tracker.step().await;
    assert_eq!(second.outcome, Outcome::Found);
    let found = second.fresh_value().expect("extract value is fresh");
    assert_eq!(found.speed_kmh, 50);
    assert_eq!(found.source, LimitSource::Offline);

    // Third cycle is still in the same grid cell: the cache answers, unless
    // the accuracy gate distrusts the entry and the extract answers again
    let third = tracker.step().await;
    assert_eq!(third.outcome, Outcome::Found);
    assert!(matches!(
        third.fresh_value().unwrap().source,
        LimitSource::Cache | LimitSource::Offline
    ));

    let stats = tracker.stats();
    assert_eq!(stats.offline_hits + stats.cache_hits, 2);
    assert!(stats.gps_updates >= 3);
    // No serial link attached, so nothing was sent
    assert_eq!(stats.ttl_sends, 0);
}

#[tokio::test]
async fn drive_without_any_source_retains_nothing() {
    let source = FixSource::demo(DriveSimulator::seeded(3));
    let mut tracker = Tracker::new(source, offline_client());

    tracker.step().await;
    let second = tracker.step().await;

    assert_eq!(second.outcome, Outcome::NotFound);
    assert!(second.display.is_none(), "nothing to retain yet");
    assert_eq!(tracker.stats().null_responses, 1);
}

#[tokio::test]
async fn found_value_lands_in_event_log() {
    let source = FixSource::demo(DriveSimulator::seeded(3));
    let mut tracker = Tracker::new(source, offline_client()).with_offline(extract_at_start());

    tracker.step().await;
    let found = tracker.step().await;
    assert_eq!(found.outcome, Outcome::Found);

    // A long simulated pause is not possible without sleeping, but the event
    // log should already carry the found value
    let log = tracker.log();
    let entries = log.lock().unwrap().recent(10);
    assert!(entries.iter().any(|e| e.message.contains("50 km/h")));
}
