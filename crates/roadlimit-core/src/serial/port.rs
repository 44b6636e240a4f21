//! Serial port discovery and setup

use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use tracing::debug;

use super::{SerialError, PORT_TIMEOUT_MS};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g. "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => (Some(usb.vid), Some(usb.pid), usb.product),
            _ => (None, None, None),
        };
        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Sort key putting ttyACM* first, then ttyUSB*, each numerically by suffix
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        return (0, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        return (1, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in deterministic order.
///
/// On Linux, /dev is scanned as well because USB adapters sometimes show up
/// there before the enumeration API sees them.
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let port = PortInfo::from(info);
        map.entry(port.name.clone()).or_insert(port);
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{fname}");
                    map.entry(full.clone()).or_insert(PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        product: None,
                    });
                }
            }
        }
    }

    let mut ports: Vec<PortInfo> = map.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

/// Open a port configured for the display: 8N1, no flow control, DTR and RTS
/// asserted so the adapter keeps the line up.
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, SerialError> {
    let mut port = serialport::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
        .open()
        .map_err(|e| SerialError::Port(e.to_string()))?;

    if let Err(err) = port.write_data_terminal_ready(true) {
        debug!(error = %err, "could not assert DTR, continuing");
    }
    if let Err(err) = port.write_request_to_send(true) {
        debug!(error = %err, "could not assert RTS, continuing");
    }

    Ok(port)
}

/// First port from [`list_ports`], the way the prototype picked its device
pub fn first_port() -> Result<PortInfo, SerialError> {
    list_ports().into_iter().next().ok_or(SerialError::NoPortFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_does_not_panic() {
        for port in list_ports() {
            println!("found port: {} {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_ordering() {
        let names = [
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/rfcomm0",
            "/dev/ttyACM10",
        ];
        let mut sorted: Vec<&str> = names.to_vec();
        sorted.sort_by_key(|n| port_sort_key(n));

        assert_eq!(
            sorted,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/rfcomm0",
            ]
        );
    }
}
