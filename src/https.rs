//! HTTPS POST transaction (AT+SH* application stack)
//!
//! A POST is a fixed ordered sequence of configuration, connect, header and
//! payload-transfer commands, followed by the request trigger and a
//! parameterized read-back of the response. The sequence is declarative
//! data built per transaction, not inline control flow, so it can be
//! inspected and tested on its own. The first failing step aborts the
//! whole session; a cleanup disconnect is always issued afterwards.

use crate::protocol::{Command, CommandExecutor, ExecutorError};
use crate::transport::Transport;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

static PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>").expect("valid pattern"));
static SHSTATE_CONNECTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\+SHSTATE: 1").expect("valid pattern"));
static SHSTATE_FAILURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(ERROR.*|\+SHSTATE: 0.*)$").expect("valid pattern"));
static SHREQ_REPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+SHREQ:").expect("valid pattern"));
static SHREQ_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\+SHREQ: .*").expect("valid pattern"));
static SHREAD_REPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+SHREAD:").expect("valid pattern"));
static SHREAD_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\+SHREAD: .*").expect("valid pattern"));

/// HTTPS POST errors
#[derive(Error, Debug)]
pub enum PostError {
    /// The target URL could not be split into host and path.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A step of the transaction failed; carries the step's description
    /// and the underlying failure.
    #[error("step '{step}' failed: {source}")]
    Step {
        /// Human-readable description of the failing step.
        step: &'static str,
        /// The underlying executor error.
        source: ExecutorError,
    },

    /// A step succeeded but its reply did not carry the expected shape.
    #[error("step '{step}': unexpected reply {reply:?}")]
    UnexpectedReply {
        /// Human-readable description of the step.
        step: &'static str,
        /// The raw reply text.
        reply: String,
    },
}

/// The modem's answer to a completed POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code reported by the modem.
    pub status: u16,
    /// Raw response body text.
    pub body: String,
}

/// One step of the POST sequence: a command plus the description used in
/// logs and error reports.
#[derive(Debug, Clone)]
pub struct PostStep {
    /// Human-readable step description.
    pub description: &'static str,
    /// The command to execute.
    pub command: Command,
}

/// HTTPS session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpsConfig {
    /// Settle delay after the connect command; TLS session setup is
    /// empirically much slower than the other steps.
    pub connect_delay: Duration,
    /// Value for the modem's maximum request body length.
    pub max_body_len: usize,
    /// Value for the modem's maximum header length.
    pub max_header_len: usize,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_secs(5),
            max_body_len: 4096,
            max_header_len: 350,
        }
    }
}

impl HttpsConfig {
    /// Create a config with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect settle delay.
    #[must_use]
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Set the maximum request body length announced to the modem.
    #[must_use]
    pub fn max_body_len(mut self, len: usize) -> Self {
        self.max_body_len = len;
        self
    }
}

/// HTTPS POST session
pub struct HttpsSession<'a, T: Transport> {
    executor: &'a mut CommandExecutor<T>,
    config: HttpsConfig,
}

impl<'a, T: Transport> HttpsSession<'a, T> {
    /// Create a session over a shared executor.
    pub fn new(executor: &'a mut CommandExecutor<T>, config: HttpsConfig) -> Self {
        Self { executor, config }
    }

    /// POST `body` as `application/json` to `url` and read back the HTTP
    /// response.
    ///
    /// Stops at the first failing step and reports it as one [`PostError`]
    /// tagged with that step's description; no partial-sequence rollback
    /// is attempted. A final disconnect is issued regardless of outcome,
    /// with its own errors swallowed. The session itself never retries;
    /// callers may retry at a higher level.
    pub fn post(&mut self, url: &str, body: &str) -> Result<HttpResponse, PostError> {
        let target = TargetUrl::parse(url)?;
        info!(url = %url, bytes = body.len(), "starting HTTPS POST");

        let result = self.post_inner(&target, body);
        self.disconnect();
        result
    }

    fn post_inner(&mut self, target: &TargetUrl, body: &str) -> Result<HttpResponse, PostError> {
        for step in self.sequence(target, body.len()) {
            self.run_step(&step)?;
        }

        // The size announcement above left the modem at its "ready for
        // input" prompt; the body goes over the wire as a raw payload.
        self.run_step(&PostStep {
            description: "write request payload",
            command: Command::new(body).raw_payload(),
        })?;

        let step = "send POST request";
        let reply = self.run_step(&PostStep {
            description: step,
            command: Command::new(format!("AT+SHREQ=\"{}\",3", target.path))
                .success(&SHREQ_REPLY)
                .extract(&SHREQ_EXTRACT)
                .retry_limit(10),
        })?;
        let (status, length) = parse_shreq_reply(&reply)
            .ok_or_else(|| PostError::UnexpectedReply { step, reply })?;

        if length == 0 {
            return Ok(HttpResponse {
                status,
                body: String::new(),
            });
        }

        let step = "read response body";
        let reply = self.run_step(&PostStep {
            description: step,
            command: Command::new(format!("AT+SHREAD=0,{length}"))
                .success(&SHREAD_REPLY)
                .extract(&SHREAD_EXTRACT),
        })?;
        let body = parse_shread_reply(&reply)
            .ok_or_else(|| PostError::UnexpectedReply { step, reply })?;

        Ok(HttpResponse { status, body })
    }

    /// The fixed configuration/connect/header/payload-size sequence.
    pub fn sequence(&self, target: &TargetUrl, body_len: usize) -> Vec<PostStep> {
        let step = |description: &'static str, command: Command| PostStep {
            description,
            command,
        };

        vec![
            step(
                "set TLS version",
                Command::new("AT+CSSLCFG=\"sslversion\",1,3"),
            ),
            step(
                "relax certificate time checks",
                Command::new("AT+CSSLCFG=\"ignorertctime\",1,1"),
            ),
            step(
                "set SNI hostname",
                Command::new(format!("AT+CSSLCFG=\"sni\",1,\"{}\"", target.host)),
            ),
            step("relax TLS verification", Command::new("AT+SHSSL=1,\"\"")),
            step(
                "set target URL",
                Command::new(format!("AT+SHCONF=\"URL\",\"{}\"", target.base)),
            ),
            step(
                "set max body length",
                Command::new(format!("AT+SHCONF=\"BODYLEN\",{}", self.config.max_body_len)),
            ),
            step(
                "set max header length",
                Command::new(format!(
                    "AT+SHCONF=\"HEADERLEN\",{}",
                    self.config.max_header_len
                )),
            ),
            step(
                "connect",
                Command::new("AT+SHCONN").post_send_delay(self.config.connect_delay),
            ),
            step(
                "verify connection state",
                Command::new("AT+SHSTATE?")
                    .success(&SHSTATE_CONNECTED)
                    .failure(&SHSTATE_FAILURE),
            ),
            step("reset request headers", Command::new("AT+SHCHEAD")),
            step(
                "set content type",
                Command::new("AT+SHAHEAD=\"Content-Type\",\"application/json\""),
            ),
            step(
                "announce payload size",
                Command::new(format!("AT+SHBOD={body_len},10000")).success(&PROMPT),
            ),
        ]
    }

    fn run_step(&mut self, step: &PostStep) -> Result<String, PostError> {
        debug!(step = step.description, command = %step.command.text, "running POST step");
        self.executor
            .execute(&step.command)
            .map_err(|source| PostError::Step {
                step: step.description,
                source,
            })
    }

    /// Cleanup disconnect. Errors are swallowed: the connection may
    /// already be gone, and there is nothing left to protect.
    fn disconnect(&mut self) {
        if let Err(e) = self.executor.execute(&Command::new("AT+SHDISC")) {
            warn!(error = %e, "disconnect after POST failed");
        }
    }
}

/// A URL split into the pieces the modem wants: SNI host, base URL for
/// `SHCONF`, and request path for `SHREQ`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    /// Hostname without scheme or port, for SNI.
    pub host: String,
    /// Scheme plus authority, e.g. `https://example.com`.
    pub base: String,
    /// Request path, `/` if the URL has none.
    pub path: String,
}

impl TargetUrl {
    /// Split a URL of the form `https://host[:port][/path]`.
    pub fn parse(url: &str) -> Result<Self, PostError> {
        let rest = url
            .strip_prefix("https://")
            .ok_or_else(|| PostError::InvalidUrl(url.to_string()))?;

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{path}")),
            None => (rest, "/".to_string()),
        };
        if authority.is_empty() {
            return Err(PostError::InvalidUrl(url.to_string()));
        }

        let host = authority
            .split_once(':')
            .map_or(authority, |(host, _)| host);

        Ok(Self {
            host: host.to_string(),
            base: format!("https://{authority}"),
            path,
        })
    }
}

/// Parse `+SHREQ: "POST",<status>,<length>`.
fn parse_shreq_reply(reply: &str) -> Option<(u16, usize)> {
    let mut parts = reply.rsplit(',');
    let length = parts.next()?.trim().parse().ok()?;
    let status = parts.next()?.trim().parse().ok()?;
    Some((status, length))
}

/// Strip the `+SHREAD: <n>` header line; the remainder is the body.
fn parse_shread_reply(reply: &str) -> Option<String> {
    let (_, body) = reply.split_once('\n')?;
    Some(body.to_string())
}
