//! gpsd client
//!
//! Minimal client for the gpsd JSON protocol: connect, enable watch mode,
//! and pull TPV reports off the stream. Only the fields the resolver needs
//! are parsed; everything else on the wire is ignored.

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::LocationFix;

/// Default gpsd listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:2947";

/// Command that switches the session into streaming JSON mode
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Accuracy assumed when a TPV report carries no error estimate at all
const FALLBACK_ACCURACY_M: f64 = 50.0;

/// gpsd TPV report, reduced to the fields we use
#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Estimated horizontal position error, metres
    eph: Option<f64>,
    /// Longitude / latitude error estimates, metres
    epx: Option<f64>,
    epy: Option<f64>,
    time: Option<DateTime<Utc>>,
}

/// Streaming connection to a gpsd daemon
pub struct GpsdSource {
    reader: BufReader<TcpStream>,
}

impl GpsdSource {
    /// Connect to gpsd and enable watch mode
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(WATCH_COMMAND).await?;

        debug!(addr, "gpsd watch enabled");
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Wait for the next usable fix, up to `wait`.
    ///
    /// Reports without a 2D fix (`mode < 2`) or without coordinates are
    /// skipped. Returns `None` on timeout or a broken stream; the poll loop
    /// treats that as a GPS error and tries again next cycle.
    pub async fn next_fix(&mut self, wait: Duration) -> Option<LocationFix> {
        let deadline = tokio::time::Instant::now() + wait;
        let mut line = String::new();

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            line.clear();
            match timeout(remaining, self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) => {
                    warn!("gpsd closed the connection");
                    return None;
                }
                Ok(Ok(_)) => {
                    if let Some(fix) = parse_report(&line) {
                        return Some(fix);
                    }
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "gpsd read failed");
                    return None;
                }
                Err(_) => return None,
            }
        }
    }
}

/// Parse one line of gpsd output into a fix, if it is a usable TPV report
fn parse_report(line: &str) -> Option<LocationFix> {
    let value: serde_json::Value = match serde_json::from_str(line.trim()) {
        Ok(v) => v,
        Err(err) => {
            debug!(error = %err, "unparseable gpsd line");
            return None;
        }
    };

    if value.get("class").and_then(|c| c.as_str()) != Some("TPV") {
        return None;
    }

    let tpv: Tpv = serde_json::from_value(value).ok()?;
    if tpv.mode < 2 {
        return None;
    }
    let (lat, lon) = (tpv.lat?, tpv.lon?);

    let accuracy_m = tpv
        .eph
        .or_else(|| match (tpv.epx, tpv.epy) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (Some(x), None) => Some(x),
            (None, Some(y)) => Some(y),
            (None, None) => None,
        })
        .unwrap_or(FALLBACK_ACCURACY_M);

    Some(LocationFix::new(
        lat,
        lon,
        accuracy_m,
        tpv.time.unwrap_or_else(Utc::now),
    ))
}
