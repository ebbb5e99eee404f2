//! Transport layer for the byte stream between host and modem
//!
//! The engine only needs three capabilities from the wire: write raw bytes,
//! report how many bytes are waiting without blocking, and read whatever is
//! currently buffered. Everything above this layer (retries, pattern
//! matching, timing) lives in [`crate::protocol`]; nothing below it knows
//! anything about AT commands.

mod serial;

pub mod mock;

pub use serial::{list_ports, SerialConfig, SerialFlowControl, SerialTransport};

use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-stream access to the modem.
///
/// Implementations carry no protocol knowledge and no retry or timing logic.
/// The serial line is half duplex from the engine's point of view: the
/// executor owns the transport exclusively and never interleaves commands.
pub trait Transport {
    /// Send raw bytes.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes currently buffered for reading. Never blocks.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read the currently buffered bytes. May return an empty buffer.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;
}
