//! AT command protocol engine
//!
//! This module provides:
//! - [`Command`]: one AT command line plus the patterns that decide its fate
//! - Response cleanup and classification (success / failure / ambiguous)
//! - [`CommandExecutor`]: the send / bounded-read-retry / classify loop
//!
//! The engine knows nothing about any specific AT vocabulary; command
//! strings and patterns are configuration data supplied by the caller.
//! The session modules ([`crate::gnss`], [`crate::network`],
//! [`crate::https`]) are such callers.

mod classify;
mod command;
mod executor;

pub use classify::{classify, ClassifiedResponse};
pub use command::Command;
pub use executor::{CommandExecutor, ExecutorConfig, ExecutorError};
