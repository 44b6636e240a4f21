//! Offline extract loading from disk

use std::fs;

use roadlimit_core::offline::{OfflineError, OfflineLookup};

const EXTRACT: &str = r#"{
  "version": 0.6,
  "generator": "Overpass API",
  "elements": [
    {
      "type": "way",
      "id": 23894723,
      "tags": {"highway": "trunk", "maxspeed": "80", "name": "Hosur Road"},
      "geometry": [
        {"lat": 12.9082, "lon": 77.6245},
        {"lat": 12.9090, "lon": 77.6250}
      ]
    },
    {
      "type": "way",
      "id": 23894724,
      "tags": {"highway": "residential", "maxspeed": "30 mph"},
      "geometry": [{"lat": 12.8456, "lon": 77.6612}]
    },
    {
      "type": "node",
      "id": 9,
      "tags": {}
    }
  ]
}"#;

#[test]
fn load_and_search_extract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bengaluru_speed_limits.json");
    fs::write(&path, EXTRACT).unwrap();

    let lookup = OfflineLookup::load(&path).unwrap();
    assert_eq!(lookup.road_count(), 3);
    assert_eq!(lookup.roads_with_limit(), 2);

    let hit = lookup.find_speed_limit(12.9082, 77.6245).unwrap();
    assert_eq!(hit.speed_kmh, 80);
    assert_eq!(hit.road_name.as_deref(), Some("Hosur Road"));

    // Imperial limits come back converted
    let hit = lookup.find_speed_limit(12.8456, 77.6612).unwrap();
    assert_eq!(hit.speed_kmh, 48);
    assert!(hit.road_name.is_none());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = OfflineLookup::load(std::path::Path::new("/nonexistent/extract.json")).unwrap_err();
    assert!(matches!(err, OfflineError::Io(_)));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = OfflineLookup::load(&path).unwrap_err();
    assert!(matches!(err, OfflineError::Parse(_)));
}
