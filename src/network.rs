//! Packet-data context management (AT+CNACT)
//!
//! The link state is derived fresh from the modem on every query and never
//! cached: the physical network can come and go between calls.

use crate::protocol::{Command, CommandExecutor};
use crate::transport::Transport;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

// An active context reports `+CNACT: 0,1,"<ip>"`; deactivated contexts
// report `0,0` with the all-zero IP.
static CNACT_UP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\+CNACT: 0,1,""#).expect("valid pattern"));
static CNACT_DOWN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""0\.0\.0\.0""#).expect("valid pattern"));
static CNACT_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\+CNACT: .*").expect("valid pattern"));

/// Packet-data link state, derived fresh per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkState {
    /// Context is active with the given IP address.
    Up(String),
    /// Context is inactive.
    Down,
}

impl NetworkState {
    /// Whether the context is active.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up(_))
    }
}

/// Packet-data context session
pub struct NetworkSession<'a, T: Transport> {
    executor: &'a mut CommandExecutor<T>,
}

impl<'a, T: Transport> NetworkSession<'a, T> {
    /// Create a session over a shared executor.
    pub fn new(executor: &'a mut CommandExecutor<T>) -> Self {
        Self { executor }
    }

    /// Query the current context state.
    ///
    /// Any outcome other than an unambiguous "active with a routable IP" —
    /// the all-zero IP, a modem error, even a transport hiccup — maps to
    /// [`NetworkState::Down`] for caller simplicity.
    pub fn state(&mut self) -> NetworkState {
        let query = Command::new("AT+CNACT?")
            .success(&CNACT_UP)
            .failure(&CNACT_DOWN)
            .extract(&CNACT_EXTRACT);

        match self.executor.execute(&query) {
            Ok(report) => match extract_ip(&report) {
                Some(ip) => {
                    debug!(ip = %ip, "packet-data context is active");
                    NetworkState::Up(ip)
                }
                None => NetworkState::Down,
            },
            Err(e) => {
                debug!(error = %e, "treating context as down");
                NetworkState::Down
            }
        }
    }

    /// Whether the packet-data context is currently active.
    pub fn is_up(&mut self) -> bool {
        self.state().is_up()
    }

    /// Activate the packet-data context. Idempotent: succeeds trivially if
    /// the context is already up. Returns `false` (logged, non-fatal) on
    /// failure rather than propagating, so a caller can still attempt
    /// GNSS-only work.
    pub fn activate(&mut self) -> bool {
        if let NetworkState::Up(ip) = self.state() {
            info!(ip = %ip, "packet-data context already active");
            return true;
        }

        info!("activating packet-data context");
        match self.executor.execute(&Command::new("AT+CNACT=0,1")) {
            Ok(_) => {
                info!("packet-data context activated");
                true
            }
            Err(e) => {
                warn!(error = %e, "packet-data activation failed");
                false
            }
        }
    }

    /// Deactivate the packet-data context. No-op if already down.
    pub fn deactivate(&mut self) -> bool {
        if !self.state().is_up() {
            debug!("packet-data context already down");
            return true;
        }

        info!("deactivating packet-data context");
        match self.executor.execute(&Command::new("AT+CNACT=0,0")) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "packet-data deactivation failed");
                false
            }
        }
    }
}

/// Pull the quoted IP out of a `+CNACT: 0,1,"<ip>"` report.
fn extract_ip(report: &str) -> Option<String> {
    let (_, rest) = report.split_once('"')?;
    let (ip, _) = rest.split_once('"')?;
    if ip.is_empty() || ip == "0.0.0.0" {
        return None;
    }
    Some(ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ExecutorConfig;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    fn fast_executor(mock: MockTransport) -> CommandExecutor<MockTransport> {
        CommandExecutor::new(mock, ExecutorConfig::new().read_backoff(Duration::ZERO))
    }

    #[test]
    fn test_state_up_with_ip() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,1,\"10.94.36.44\"\r\nOK\r\n");
        let mut exec = fast_executor(mock);

        assert_eq!(
            NetworkSession::new(&mut exec).state(),
            NetworkState::Up("10.94.36.44".to_string())
        );
    }

    #[test]
    fn test_all_zero_ip_is_down() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,0,\"0.0.0.0\"\r\nOK\r\n");
        let mut exec = fast_executor(mock);

        assert_eq!(NetworkSession::new(&mut exec).state(), NetworkState::Down);
    }

    #[test]
    fn test_executor_error_is_down() {
        // Silence on the wire counts as down, not an error.
        let mut exec = fast_executor(MockTransport::new());
        assert_eq!(NetworkSession::new(&mut exec).state(), NetworkState::Down);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,1,\"10.0.0.2\"\r\nOK\r\n");
        let mut exec = fast_executor(mock);

        assert!(NetworkSession::new(&mut exec).activate());
        // Only the query hit the wire; no activation command followed.
        assert_eq!(exec_written_count(&exec), 2);
    }

    #[test]
    fn test_activate_when_down() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,0,\"0.0.0.0\"\r\nOK\r\n");
        mock.push_reply(b"AT+CNACT=0,1\r\nOK\r\n");
        let mut exec = fast_executor(mock);

        assert!(NetworkSession::new(&mut exec).activate());
    }

    #[test]
    fn test_activation_failure_is_non_fatal() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,0,\"0.0.0.0\"\r\nOK\r\n");
        mock.push_reply(b"AT+CNACT=0,1\r\nERROR\r\n");
        let mut exec = fast_executor(mock);

        assert!(!NetworkSession::new(&mut exec).activate());
    }

    #[test]
    fn test_deactivate_noop_when_down() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"AT+CNACT?\r\n+CNACT: 0,0,\"0.0.0.0\"\r\nOK\r\n");
        let mut exec = fast_executor(mock);

        assert!(NetworkSession::new(&mut exec).deactivate());
        assert_eq!(exec_written_count(&exec), 2);
    }

    fn exec_written_count(exec: &CommandExecutor<MockTransport>) -> usize {
        exec_transport(exec).written().len()
    }

    fn exec_transport(exec: &CommandExecutor<MockTransport>) -> &MockTransport {
        // Tests live in a sibling module, so go through the accessor.
        exec.transport_ref()
    }
}
