//! Serial port transport implementation

use super::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;

/// Serial port flow control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialFlowControl {
    /// No flow control
    None,
    /// Hardware flow control (RTS/CTS)
    #[default]
    Hardware,
    /// Software flow control (XON/XOFF)
    Software,
}

/// Serial port configuration
///
/// The defaults match the Waveshare SIM7080G HAT wiring: 115200 baud,
/// hardware flow control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttyUSB2, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Flow control
    pub flow_control: SerialFlowControl,
    /// Read timeout for individual read calls
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Create a new serial configuration with default settings
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            flow_control: SerialFlowControl::Hardware,
            read_timeout: Duration::from_millis(100),
        }
    }

    /// Set flow control
    #[must_use]
    pub fn flow_control(mut self, flow: SerialFlowControl) -> Self {
        self.flow_control = flow;
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB2", 115_200)
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the configured port and clear any stale buffer contents.
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        let flow_control = match config.flow_control {
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
            SerialFlowControl::None => FlowControl::None,
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .flow_control(flow_control)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(config.port.clone())
                }
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    TransportError::PermissionDenied(config.port.clone())
                }
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        port.clear(ClearBuffer::All)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self { config, port })
    }

    /// Connection info string
    pub fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({})",
            self.config.port,
            self.config.baud_rate,
            match self.config.flow_control {
                SerialFlowControl::None => "No FC",
                SerialFlowControl::Hardware => "HW FC",
                SerialFlowControl::Software => "SW FC",
            }
        )
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(waiting as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let waiting = self.bytes_available()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; waiting];
        match self.port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::ConnectionFailed(e.to_string()))
}
