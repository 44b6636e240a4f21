//! HERE route-match client
//!
//! Two-step flow: fetch an OAuth2 bearer token with the configured client
//! credentials (cached until shortly before expiry), then POST the GPS trace
//! to the route-match endpoint and pull the first usable speed limit off the
//! matched links.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::ClientError;
use crate::config::HereConfig;
use crate::units::mph_to_kmh;

/// Token lifetime assumed when the endpoint does not say
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Refresh the token this long before it actually expires
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MatchResponse {
    #[serde(default, rename = "match")]
    matches: Vec<RouteMatch>,
}

#[derive(Debug, Deserialize)]
struct RouteMatch {
    #[serde(default, rename = "routeLinks")]
    route_links: Vec<RouteLink>,
}

#[derive(Debug, Deserialize)]
struct RouteLink {
    /// Attribute values arrive as numbers or strings depending on the layer,
    /// so they are coerced on access rather than typed here.
    attributes: Option<HashMap<String, serde_json::Value>>,
}

/// Cached bearer token
#[derive(Debug, Default)]
struct TokenCache {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl TokenCache {
    fn valid(&self) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expiry)) if Instant::now() < expiry => Some(token),
            _ => None,
        }
    }

    fn store(&mut self, token: String, ttl: Duration) {
        let margin = Duration::from_secs(TOKEN_EXPIRY_MARGIN_SECS);
        self.expires_at = Some(Instant::now() + ttl.saturating_sub(margin));
        self.token = Some(token);
    }
}

/// HERE route-match API client with token caching
pub struct HereClient {
    http: reqwest::Client,
    config: HereConfig,
    token: TokenCache,
}

impl HereClient {
    /// Create a client; fails if the config carries no credentials
    pub fn new(http: reqwest::Client, config: HereConfig) -> Result<Self, ClientError> {
        if !config.has_credentials() {
            return Err(ClientError::MissingCredentials);
        }
        Ok(Self {
            http,
            config,
            token: TokenCache::default(),
        })
    }

    /// Match the trace against the road network and return the first
    /// positive speed limit, in km/h.
    pub async fn match_speed_limit(
        &mut self,
        trace: &[(f64, f64)],
    ) -> Result<Option<u32>, ClientError> {
        if trace.is_empty() {
            return Err(ClientError::EmptyTrace);
        }

        let token = self.access_token().await?;

        let points: Vec<serde_json::Value> = trace
            .iter()
            .map(|(lat, lon)| json!({ "lat": lat, "lon": lon }))
            .collect();
        let body = json!({ "trace": points });

        let response = self
            .http
            .post(&self.config.match_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::MatchStatus(response.status()));
        }

        let parsed: MatchResponse = response.json().await?;
        Ok(first_link_speed(&parsed))
    }

    /// Return a valid bearer token, fetching a fresh one if needed
    async fn access_token(&mut self) -> Result<String, ClientError> {
        if let Some(token) = self.token.valid() {
            return Ok(token.to_string());
        }

        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        let encoded = BASE64.encode(credentials.as_bytes());

        let response = self
            .http
            .post(&self.config.token_url)
            .header("Authorization", format!("Basic {encoded}"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::TokenStatus(response.status()));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|_| ClientError::MalformedToken)?;

        let ttl = Duration::from_secs(parsed.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        debug!(ttl_secs = ttl.as_secs(), "HERE token refreshed");
        self.token.store(parsed.access_token.clone(), ttl);

        Ok(parsed.access_token)
    }
}

/// Walk matched links in order and return the first positive
/// FROM_REF_SPEED_LIMIT, converted to km/h when the unit says MPH.
fn first_link_speed(response: &MatchResponse) -> Option<u32> {
    for route_match in &response.matches {
        for link in &route_match.route_links {
            let Some(attributes) = &link.attributes else {
                continue;
            };
            let Some(speed) = int_attr(attributes, "FROM_REF_SPEED_LIMIT") else {
                continue;
            };
            if speed == 0 {
                continue;
            }

            let unit = attributes
                .get("UNIT")
                .and_then(|v| v.as_str())
                .unwrap_or("KMH");
            let kmh = if unit.eq_ignore_ascii_case("MPH") {
                mph_to_kmh(speed)
            } else {
                speed
            };
            return Some(kmh);
        }
    }
    None
}

/// Read an attribute as an integer whether it arrived as a number or string
fn int_attr(attributes: &HashMap<String, serde_json::Value>, key: &str) -> Option<u32> {
    match attributes.get(key)? {
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as u32),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
