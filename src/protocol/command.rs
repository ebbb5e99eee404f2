//! AT command descriptor

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Default number of read attempts per command.
pub const DEFAULT_RETRY_LIMIT: usize = 3;

static DEFAULT_SUCCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^OK$").expect("valid pattern"));
static DEFAULT_FAILURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ERROR.*").expect("valid pattern"));
static DEFAULT_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s).*").expect("valid pattern"));

/// One AT command line plus the patterns used to judge the modem's reply.
///
/// A `Command` is an immutable value built per call site. The defaults
/// cover the common case: a bare `OK` line means success, a line starting
/// with `ERROR` means failure, and the entire cleaned reply body is
/// returned on success. Patterns are matched against the full cleaned
/// reply, so line-anchored patterns should carry the `(?m)` flag.
#[derive(Debug, Clone)]
pub struct Command {
    /// The line to send, without line terminator.
    pub text: String,
    /// Reply pattern that means the command succeeded.
    pub success: Regex,
    /// Reply pattern that means the modem rejected the command.
    pub failure: Regex,
    /// Pattern selecting the text returned to the caller on success.
    pub extract: Regex,
    /// Extra wait before the first read, for operations known to be slow
    /// (e.g. TLS connection setup).
    pub post_send_delay: Option<Duration>,
    /// Maximum number of read attempts before giving up.
    pub retry_limit: usize,
    /// Whether to append the line terminator when sending. Disabled for
    /// raw payload writes (e.g. an HTTP body after a `>` prompt).
    pub line_terminated: bool,
}

impl Command {
    /// A command with default OK/ERROR patterns.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: DEFAULT_SUCCESS.clone(),
            failure: DEFAULT_FAILURE.clone(),
            extract: DEFAULT_EXTRACT.clone(),
            post_send_delay: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            line_terminated: true,
        }
    }

    /// Set the success pattern.
    #[must_use]
    pub fn success(mut self, pattern: &Regex) -> Self {
        self.success = pattern.clone();
        self
    }

    /// Set the failure pattern.
    #[must_use]
    pub fn failure(mut self, pattern: &Regex) -> Self {
        self.failure = pattern.clone();
        self
    }

    /// Set the extraction pattern applied to successful replies.
    #[must_use]
    pub fn extract(mut self, pattern: &Regex) -> Self {
        self.extract = pattern.clone();
        self
    }

    /// Wait this long after sending before the first read.
    #[must_use]
    pub fn post_send_delay(mut self, delay: Duration) -> Self {
        self.post_send_delay = Some(delay);
        self
    }

    /// Set the read attempt limit.
    #[must_use]
    pub fn retry_limit(mut self, limit: usize) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Send the text as-is, without appending the line terminator.
    #[must_use]
    pub fn raw_payload(mut self) -> Self {
        self.line_terminated = false;
        self
    }
}
