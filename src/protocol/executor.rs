//! Command execution against the transport
//!
//! Implements the half-duplex request/response protocol: send one command,
//! then poll the transport under a bounded retry budget until the reply
//! classifies as success or failure, or the budget runs out. The modem
//! serializes commands itself, so exactly one command is ever in flight.

use super::{classify, ClassifiedResponse, Command};
use crate::transport::{Transport, TransportError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors surfaced by [`CommandExecutor::execute`].
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// I/O failure on the underlying stream. Fatal to the current
    /// operation; the engine does not retry it.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The modem explicitly reported an error. Not retried; carries the
    /// raw failure text for diagnosis.
    #[error("modem reported failure: {0}")]
    ProtocolFailure(String),

    /// The read-retry budget ran out without a classifiable reply.
    /// Callers treat this as transient and may re-issue the operation.
    #[error("no matching response after {attempts} read attempts")]
    NoMatchingResponse {
        /// Number of read attempts made.
        attempts: usize,
    },
}

/// Executor timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Sleep between read attempts when no classifiable data has arrived.
    pub read_backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            read_backoff: Duration::from_secs(3),
        }
    }
}

impl ExecutorConfig {
    /// Create a config with the default backoff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sleep between read attempts.
    #[must_use]
    pub fn read_backoff(mut self, backoff: Duration) -> Self {
        self.read_backoff = backoff;
        self
    }
}

/// Line terminator appended to every command.
const LINE_TERMINATOR: &str = "\r\n";

/// Synchronous AT command executor.
///
/// Owns the transport exclusively for the engine's lifetime; session
/// objects share the executor by mutable reference, never the transport
/// directly.
pub struct CommandExecutor<T: Transport> {
    transport: T,
    config: ExecutorConfig,
}

impl<T: Transport> CommandExecutor<T> {
    /// Create an executor over the given transport.
    pub fn new(transport: T, config: ExecutorConfig) -> Self {
        Self { transport, config }
    }

    /// Send one command and wait for a terminal outcome.
    ///
    /// Each loop iteration is one read attempt against the retry budget,
    /// whether or not data was waiting; an iteration that finds the line
    /// silent sleeps the backoff and consumes a slot, keeping the whole
    /// loop bounded by `retry_limit`.
    pub fn execute(&mut self, cmd: &Command) -> Result<String, ExecutorError> {
        debug!(command = %cmd.text, "sending command");

        self.transport.write(cmd.text.as_bytes())?;
        if cmd.line_terminated {
            self.transport.write(LINE_TERMINATOR.as_bytes())?;
        }

        if let Some(delay) = cmd.post_send_delay {
            trace!(?delay, "post-send settle delay");
            std::thread::sleep(delay);
        }

        for attempt in 1..=cmd.retry_limit {
            trace!(attempt, limit = cmd.retry_limit, "read attempt");

            if self.transport.bytes_available()? == 0 {
                warn!(attempt, "no response data waiting");
                std::thread::sleep(self.config.read_backoff);
                continue;
            }

            let raw = self.transport.read_available()?;
            let text = String::from_utf8_lossy(&raw);
            trace!(response = %text, "raw response");

            match classify(&text, cmd) {
                ClassifiedResponse::Success(extracted) => {
                    debug!(command = %cmd.text, "command succeeded");
                    return Ok(extracted);
                }
                ClassifiedResponse::Failure(failure_text) => {
                    debug!(command = %cmd.text, failure = %failure_text, "command failed");
                    return Err(ExecutorError::ProtocolFailure(failure_text));
                }
                ClassifiedResponse::Ambiguous => {
                    warn!(attempt, "response matched neither pattern");
                    std::thread::sleep(self.config.read_backoff);
                }
            }
        }

        Err(ExecutorError::NoMatchingResponse {
            attempts: cmd.retry_limit,
        })
    }

    /// Poll a plain `AT` until the modem answers `OK`, up to `max_attempts`
    /// whole-command attempts. Returns the last error on exhaustion.
    pub fn wait_until_ready(&mut self, max_attempts: usize) -> Result<(), ExecutorError> {
        let probe = Command::new("AT");
        let mut last_err = ExecutorError::NoMatchingResponse { attempts: 0 };

        for attempt in 1..=max_attempts {
            match self.execute(&probe) {
                Ok(_) => {
                    debug!(attempt, "modem is ready and responsive");
                    return Ok(());
                }
                Err(e @ ExecutorError::Transport(_)) => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "modem not ready yet");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Access the executor's timing configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Borrow the underlying transport for inspection. The executor keeps
    /// ownership; nothing else may write through it.
    pub fn transport_ref(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn executor(mock: MockTransport) -> CommandExecutor<MockTransport> {
        // Zero backoff keeps the retry loops instant under test.
        CommandExecutor::new(mock, ExecutorConfig::new().read_backoff(Duration::ZERO))
    }

    #[test]
    fn test_sends_command_with_line_terminator() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT\r\nOK\r\n");
        let mut exec = executor(mock);

        exec.execute(&Command::new("AT")).unwrap();
        // Command text and terminator are separate writes.
        assert_eq!(exec.transport.written()[0], b"AT");
        assert_eq!(exec.transport.written()[1], b"\r\n");
    }

    #[test]
    fn test_raw_payload_skips_line_terminator() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"OK\r\n");
        let mut exec = executor(mock);

        exec.execute(&Command::new("{\"k\":1}").raw_payload()).unwrap();
        assert_eq!(exec.transport.written().len(), 1);
        assert_eq!(exec.transport.written()[0], b"{\"k\":1}");
    }

    #[test]
    fn test_success_returns_immediately() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT\r\nOK\r\n").push_reply(b"UNREAD");
        let mut exec = executor(mock);

        assert!(exec.execute(&Command::new("AT")).is_ok());
        // The second chunk was never consumed.
        assert_eq!(exec.transport.remaining_replies(), 1);
    }

    #[test]
    fn test_failure_is_not_retried() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+BOGUS\r\nERROR\r\n").push_reply(b"OK\r\n");
        let mut exec = executor(mock);

        match exec.execute(&Command::new("AT+BOGUS")) {
            Err(ExecutorError::ProtocolFailure(text)) => assert_eq!(text, "ERROR"),
            other => panic!("expected protocol failure, got {other:?}"),
        }
        assert_eq!(exec.transport.remaining_replies(), 1);
    }

    #[test]
    fn test_ambiguous_reply_retried_until_success() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"+APP PDP: 0,ACTIVE\r\n").push_reply(b"OK\r\n");
        let mut exec = executor(mock);

        assert!(exec.execute(&Command::new("AT+CNACT=0,1")).is_ok());
        assert_eq!(exec.transport.remaining_replies(), 0);
    }

    #[test]
    fn test_silent_transport_exhausts_exactly_retry_limit() {
        let mut exec = executor(MockTransport::new());

        match exec.execute(&Command::new("AT").retry_limit(3)) {
            Err(ExecutorError::NoMatchingResponse { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_never_classifiable_reply_exhausts_exactly_retry_limit() {
        let mut mock = MockTransport::new();
        for _ in 0..5 {
            mock.push_reply(b"noise\r\n");
        }
        let mut exec = executor(mock);

        match exec.execute(&Command::new("AT").retry_limit(3)) {
            Err(ExecutorError::NoMatchingResponse { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // Exactly 3 classification attempts, not fewer or more.
        assert_eq!(exec.transport.remaining_replies(), 2);
    }

    #[test]
    fn test_transport_write_error_propagates() {
        let mut mock = MockTransport::new();
        mock.fail_writes();
        let mut exec = executor(mock);

        assert!(matches!(
            exec.execute(&Command::new("AT")),
            Err(ExecutorError::Transport(_))
        ));
    }

    #[test]
    fn test_wait_until_ready_retries_probe() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"garbage\r\n")
            .push_reply(b"garbage\r\n")
            .push_reply(b"garbage\r\n")
            .push_reply(b"AT\r\nOK\r\n");
        let mut exec = executor(mock);

        assert!(exec.wait_until_ready(2).is_ok());
    }

    #[test]
    fn test_wait_until_ready_bounded() {
        let mut exec = executor(MockTransport::new());
        assert!(matches!(
            exec.wait_until_ready(2),
            Err(ExecutorError::NoMatchingResponse { .. })
        ));
    }
}
