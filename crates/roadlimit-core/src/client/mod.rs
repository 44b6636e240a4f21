//! Remote speed limit lookups
//!
//! HTTP clients for the two geodata sources and the facade that chains them:
//! HERE route matching first (when credentials are configured), OSM Overpass
//! as the fallback. Failures at any stage are logged and fall through; the
//! facade answers with a hit or with nothing, never an error.

mod error;
pub mod here;
pub mod overpass;

pub use error::ClientError;
pub use here::HereClient;
pub use overpass::{OverpassClient, OverpassElement, OverpassNode, OverpassResponse};

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::limit::{LimitHit, LimitSource};

/// TCP connect timeout for both APIs
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total per-call timeout for both APIs
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// HTTP client with the timeouts both APIs are called with
pub fn http_client() -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("roadlimit/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Chained HERE + Overpass lookup
pub struct GeoSpeedLimitClient {
    here: Option<HereClient>,
    overpass: OverpassClient,
}

impl GeoSpeedLimitClient {
    /// Build the client stack from configuration.
    ///
    /// HERE is only enabled when credentials are present; Overpass always is.
    pub fn new(config: &AppConfig) -> Result<Self, ClientError> {
        let http = http_client()?;

        let here = if config.here.has_credentials() {
            Some(HereClient::new(http.clone(), config.here.clone())?)
        } else {
            debug!("no HERE credentials, running on Overpass only");
            None
        };

        Ok(Self {
            here,
            overpass: OverpassClient::new(http, config.overpass.endpoint.clone()),
        })
    }

    /// Resolve a speed limit for a GPS trace.
    ///
    /// Tries HERE with the whole trace, then Overpass around the first trace
    /// point. Every failure is logged and swallowed; `None` means neither
    /// source had a usable value.
    pub async fn lookup(&mut self, trace: &[(f64, f64)]) -> Option<LimitHit> {
        let &(lat, lon) = trace.first()?;

        if let Some(here) = &mut self.here {
            match here.match_speed_limit(trace).await {
                Ok(Some(speed)) => {
                    return Some(LimitHit::new(speed, LimitSource::Here));
                }
                Ok(None) => debug!("HERE matched no speed limit, falling back to Overpass"),
                Err(err) => warn!(error = %err, "HERE lookup failed, falling back to Overpass"),
            }
        }

        match self.overpass.speed_limit_near(lat, lon).await {
            Ok(Some(speed)) => Some(LimitHit::new(speed, LimitSource::Overpass)),
            Ok(None) => {
                debug!(lat, lon, "no maxspeed near coordinate");
                None
            }
            Err(err) => {
                warn!(error = %err, "Overpass lookup failed");
                None
            }
        }
    }

    /// Whether the HERE leg of the chain is configured
    pub fn has_here(&self) -> bool {
        self.here.is_some()
    }
}
