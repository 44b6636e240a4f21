//! OSM Overpass client
//!
//! Fallback lookup: query a small bounding box around the fix for any way or
//! relation tagged with `maxspeed` and take the first parseable value. The
//! response types here double as the schema for local extract files, which
//! are saved Overpass responses.

use std::collections::HashMap;

use serde::Deserialize;

use super::ClientError;
use crate::units::parse_maxspeed;

/// Public Overpass API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Half-size of the query bounding box, degrees (~300 m)
pub const BBOX_DELTA_DEG: f64 = 0.003;

/// Server-side query timeout, seconds
const QUERY_TIMEOUT_SECS: u32 = 5;

/// Overpass JSON response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One way / relation / node in an Overpass response
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Present when the query asked for geometry
    #[serde(default)]
    pub geometry: Vec<OverpassNode>,
}

impl OverpassElement {
    /// Parsed `maxspeed` tag, if the element carries one
    pub fn maxspeed_kmh(&self) -> Option<u32> {
        parse_maxspeed(self.tags.get("maxspeed")?)
    }
}

/// A coordinate in a way geometry
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverpassNode {
    pub lat: f64,
    pub lon: f64,
}

/// Overpass API client
pub struct OverpassClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OverpassClient {
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    /// Find a speed limit near the coordinate, in km/h
    pub async fn speed_limit_near(&self, lat: f64, lon: f64) -> Result<Option<u32>, ClientError> {
        let query = build_query(lat, lon);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("data={query}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::OverpassStatus(response.status()));
        }

        let parsed: OverpassResponse = response.json().await?;
        Ok(first_maxspeed(&parsed))
    }
}

/// Overpass QL for maxspeed-tagged ways and relations in a box around the fix
pub fn build_query(lat: f64, lon: f64) -> String {
    let bbox = format!(
        "{},{},{},{}",
        lat - BBOX_DELTA_DEG,
        lon - BBOX_DELTA_DEG,
        lat + BBOX_DELTA_DEG,
        lon + BBOX_DELTA_DEG
    );
    format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];(way[maxspeed]({bbox});rel[maxspeed]({bbox}););out tags;"
    )
}

/// First positive maxspeed in the response, in km/h
fn first_maxspeed(response: &OverpassResponse) -> Option<u32> {
    response
        .elements
        .iter()
        .filter_map(|e| e.maxspeed_kmh())
        .find(|speed| *speed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_contains_bbox_and_filters() {
        let query = build_query(12.9716, 77.5946);
        assert!(query.contains("way[maxspeed]"));
        assert!(query.contains("rel[maxspeed]"));
        assert!(query.contains(&format!("{}", 12.9716 - BBOX_DELTA_DEG)));
        assert!(query.contains(&format!("{}", 77.5946 + BBOX_DELTA_DEG)));
        assert!(query.ends_with("out tags;"));
    }

    #[test]
    fn test_first_maxspeed_takes_first_parseable() {
        let response: OverpassResponse = serde_json::from_str(
            r#"{"elements":[
                {"id":1,"tags":{"highway":"residential"}},
                {"id":2,"tags":{"maxspeed":"none"}},
                {"id":3,"tags":{"maxspeed":"40"}},
                {"id":4,"tags":{"maxspeed":"60"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_maxspeed(&response), Some(40));
    }

    #[test]
    fn test_first_maxspeed_skips_zero() {
        let response: OverpassResponse = serde_json::from_str(
            r#"{"elements":[
                {"id":1,"tags":{"maxspeed":"0"}},
                {"id":2,"tags":{"maxspeed":"30 mph"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_maxspeed(&response), Some(48));
    }

    #[test]
    fn test_empty_response() {
        let response: OverpassResponse = serde_json::from_str(r#"{"elements":[]}"#).unwrap();
        assert_eq!(first_maxspeed(&response), None);
    }
}
