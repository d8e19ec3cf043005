//! Serial port transport (host side)

use std::io::{Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::protocol::timing;
use crate::ByteTransport;

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0`
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    timing::DEFAULT_BAUD_RATE
}
fn default_timeout_ms() -> u64 {
    timing::DEFAULT_READ_TIMEOUT_MS
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Byte transport over a serial port (8N1, no flow control)
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open the port described by `settings`
    pub fn open(settings: &SerialSettings) -> Result<Self, TransportError> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .open()?;
        info!(
            "Opened serial port {} at {} baud",
            settings.port, settings.baud_rate
        );
        Ok(Self {
            port,
            name: settings.port.clone(),
        })
    }

    /// Discard anything buffered in either direction
    pub fn clear(&mut self) -> Result<(), TransportError> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

impl ByteTransport for SerialTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(TransportError::Disconnected)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial {}", self.name)
    }
}

/// A serial port found on the system
#[derive(Debug, Clone)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
}

/// Enumerate serial ports
pub fn list_ports() -> Result<Vec<PortSummary>, TransportError> {
    let ports = serialport::available_ports()?;
    debug!("Found {} serial ports", ports.len());
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.unwrap_or_default()
                ),
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "Unknown".to_string(),
            };
            PortSummary {
                name: p.port_name,
                kind,
            }
        })
        .collect())
}
