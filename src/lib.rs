//! # SIM7080 Modem Library
//!
//! A synchronous AT-command engine for SIM7080G-class cellular modems with
//! support for:
//! - Serial transports (USB-serial, UART) behind a pluggable trait
//! - Pattern-based response classification (success / failure / ambiguous)
//! - Bounded read-retry command execution
//! - GNSS positioning (power control, fix acquisition, report decoding)
//! - Packet-data context management
//! - HTTPS POST over the modem's TLS application stack
//!
//! ## Example
//!
//! ```rust,no_run
//! use sim7080::{Command, CommandExecutor, ExecutorConfig, SerialConfig, SerialTransport};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = SerialConfig::new("/dev/ttyUSB2", 115_200);
//!     let transport = SerialTransport::open(config)?;
//!     let mut executor = CommandExecutor::new(transport, ExecutorConfig::default());
//!
//!     executor.wait_until_ready(10)?;
//!     let reply = executor.execute(&Command::new("AT+GMR"))?;
//!     println!("firmware: {reply}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod gnss;
pub mod https;
pub mod network;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use crate::gnss::{GnssConfig, GnssError, GnssFix, GnssSession, ParseError};
pub use crate::https::{HttpResponse, HttpsConfig, HttpsSession, PostError};
pub use crate::network::{NetworkSession, NetworkState};
pub use crate::protocol::{
    classify, ClassifiedResponse, Command, CommandExecutor, ExecutorConfig, ExecutorError,
};
pub use crate::transport::{
    list_ports, SerialConfig, SerialFlowControl, SerialTransport, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
