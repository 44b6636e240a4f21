//! TTL display link
//!
//! Owns the open port and pushes resolved speed values to it, one raw byte
//! per send. A background thread drains whatever the device sends back and
//! hands it to a callback; read errors mark the link disconnected. Writes
//! go through `spawn_blocking` so the poll loop never blocks on the driver.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serialport::SerialPort;
use tracing::{info, warn};

use super::{open_port, SerialError};

/// Validate a display value, returning the byte to put on the wire.
///
/// The protocol carries exactly one byte; anything outside 0-255 is rejected
/// before the port is touched.
pub fn validate_speed(value: u32) -> Result<u8, SerialError> {
    u8::try_from(value).map_err(|_| SerialError::ValueOutOfRange(value))
}

/// Connection to the TTL display
pub struct TtlLink {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    port_name: String,
    connected: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
    sent: Arc<AtomicU64>,
    reader: Option<JoinHandle<()>>,
}

impl TtlLink {
    /// Open the named port and wrap it as a display link
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = open_port(name, baud_rate)?;
        info!(port = name, baud_rate, "TTL display connected");

        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            port_name: name.to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            attempts: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(AtomicU64::new(0)),
            reader: None,
        })
    }

    /// Send a speed value as a single byte.
    ///
    /// Counts every attempt; only a complete 1-byte write counts as sent.
    pub async fn send_speed(&self, value: u32) -> Result<(), SerialError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let byte = validate_speed(value)?;
        if !self.is_connected() {
            return Err(SerialError::NotConnected);
        }

        let port = Arc::clone(&self.port);
        let sent = Arc::clone(&self.sent);
        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock().map_err(|_| SerialError::Port("port lock poisoned".into()))?;
            let written = guard.write(&[byte])?;
            if written != 1 {
                return Err(SerialError::ShortWrite(written));
            }
            sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .await
        .map_err(|e| SerialError::Port(e.to_string()))?
    }

    /// Start the background reader thread.
    ///
    /// Incoming bytes are passed to `on_data`; timeouts are normal (the
    /// device is mostly silent) and skipped, any other error ends the thread
    /// and marks the link disconnected.
    pub fn start_reader<F>(&mut self, on_data: F) -> Result<(), SerialError>
    where
        F: Fn(&[u8]) + Send + 'static,
    {
        let reader_port = {
            let guard = self
                .port
                .lock()
                .map_err(|_| SerialError::Port("port lock poisoned".into()))?;
            guard
                .try_clone()
                .map_err(|e| SerialError::Port(e.to_string()))?
        };

        let connected = Arc::clone(&self.connected);
        let handle = std::thread::spawn(move || {
            let mut port = reader_port;
            let mut buf = [0u8; 64];
            while connected.load(Ordering::Relaxed) {
                match port.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => on_data(&buf[..n]),
                    Err(e)
                        if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "TTL reader failed, marking disconnected");
                        connected.store(false, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        self.reader = Some(handle);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// (attempted sends, successful sends)
    pub fn counters(&self) -> (u64, u64) {
        (
            self.attempts.load(Ordering::Relaxed),
            self.sent.load(Ordering::Relaxed),
        )
    }

    /// Stop the reader and drop the link state
    pub fn close(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        let (attempts, sent) = self.counters();
        info!(attempts, sent, "TTL link closed");
    }
}

impl Drop for TtlLink {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

/// Hex-format incoming device bytes for the event log
pub fn format_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("0x{b:02X} ({b})"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_speed_in_range() {
        assert_eq!(validate_speed(0).unwrap(), 0);
        assert_eq!(validate_speed(54).unwrap(), 54);
        assert_eq!(validate_speed(255).unwrap(), 255);
    }

    #[test]
    fn test_validate_speed_out_of_range() {
        assert!(matches!(
            validate_speed(256),
            Err(SerialError::ValueOutOfRange(256))
        ));
        assert!(matches!(
            validate_speed(1000),
            Err(SerialError::ValueOutOfRange(1000))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(&[0x36]), "0x36 (54)");
        assert_eq!(format_bytes(&[0x00, 0xFF]), "0x00 (0) 0xFF (255)");
    }
}
