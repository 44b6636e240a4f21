//! USB-serial ("TTL") display output
//!
//! The external display speaks the simplest possible protocol: one raw byte
//! per update, value 0-255, no framing, no acknowledgment. This module
//! handles port discovery, the 9600 8N1 link itself, and the background
//! reader that drains whatever the device echoes back.

mod error;
mod link;
pub mod port;

pub use error::SerialError;
pub use link::{format_bytes, validate_speed, TtlLink};
pub use port::{first_port, list_ports, open_port, PortInfo};

/// Baud rate the display hardware runs at
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Per-operation timeout on the port
pub const PORT_TIMEOUT_MS: u64 = 1000;
