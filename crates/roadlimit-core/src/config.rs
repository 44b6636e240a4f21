//! Application configuration
//!
//! JSON config file under the platform config directory, with serde-level
//! defaults so a partial (or absent) file still yields a working setup.
//! HERE credentials can also come from the environment, which wins over the
//! file.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::overpass;
use crate::location::gpsd;
use crate::serial::DEFAULT_BAUD_RATE;

/// Environment variable overriding the HERE client id
pub const ENV_HERE_CLIENT_ID: &str = "ROADLIMIT_HERE_CLIENT_ID";

/// Environment variable overriding the HERE client secret
pub const ENV_HERE_CLIENT_SECRET: &str = "ROADLIMIT_HERE_CLIENT_SECRET";

/// HERE API access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HereConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Route-match endpoint, including the attribute selection
    pub match_url: String,
}

impl Default for HereConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://account.api.here.com/oauth2/token".to_string(),
            match_url: "https://rme.api.here.com/v8/match/routes?attributes=SPEED_LIMITS"
                .to_string(),
        }
    }
}

impl HereConfig {
    /// Whether both credential halves are present
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Overpass API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverpassConfig {
    pub endpoint: String,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: overpass::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// TTL display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name; `None` means autodetect the first available port
    pub port: Option<String>,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub here: HereConfig,
    pub overpass: OverpassConfig,
    pub serial: SerialConfig,
    /// gpsd address for live tracking
    pub gpsd_addr: String,
    /// Optional local OSM extract used as the last lookup fallback
    pub offline_extract: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            here: HereConfig::default(),
            overpass: OverpassConfig::default(),
            serial: SerialConfig::default(),
            gpsd_addr: gpsd::DEFAULT_ADDR.to_string(),
            offline_extract: None,
        }
    }
}

impl AppConfig {
    /// Default config file location, e.g. `~/.config/roadlimit/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("roadlimit").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist and parse; the default path is allowed to
    /// be absent, in which case defaults apply. Environment credential
    /// overrides are applied either way.
    pub fn load(path: Option<&Path>) -> io::Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn read_file(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Overlay credentials from the environment
    pub fn apply_env(&mut self) {
        if let Ok(id) = env::var(ENV_HERE_CLIENT_ID) {
            if !id.is_empty() {
                self.here.client_id = id;
            }
        }
        if let Ok(secret) = env::var(ENV_HERE_CLIENT_SECRET) {
            if !secret.is_empty() {
                self.here.client_secret = secret;
            }
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, raw)
    }
}
