//! GNSS subsystem: power control, fix polling, CGNSINF decoding
//!
//! The modem's `AT+CGNSINF` report is a single line of 18 comma-separated
//! positional values. The field names and types come from the SIM7080
//! series documentation; decoding zips the values against that fixed
//! schema, leaving empty source fields absent rather than defaulted.

use crate::protocol::{Command, CommandExecutor, ExecutorError};
use crate::transport::Transport;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

static CGNSINF_SUCCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+CGNSINF:").expect("valid pattern"));
static CGNSINF_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\+CGNSINF.*").expect("valid pattern"));

/// A value that failed to cast to its declared field type.
///
/// Fatal to the decode attempt: a garbled fix is a decode bug, not
/// transient noise, so it is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("GNSS field {field}: cannot parse {value:?}")]
pub struct ParseError {
    /// Schema name of the offending field.
    pub field: &'static str,
    /// The raw value that failed to cast.
    pub value: String,
}

/// GNSS session errors
#[derive(Error, Debug)]
pub enum GnssError {
    /// Command execution failed in a non-recoverable way.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A fix report could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The poll budget ran out before the receiver got a lock.
    #[error("no GNSS fix after {polls} polls")]
    NoFix {
        /// Number of fix queries issued.
        polls: usize,
    },
}

/// One GNSS position solution, decoded from a `+CGNSINF:` report.
///
/// Fields are positional; empty source fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssFix {
    /// GNSS run state (0 = off, 1 = on)
    pub gnss_run_state: Option<u8>,
    /// Fix status (0 = no fix, 1 = fix)
    pub gps_fix_status: Option<u8>,
    /// UTC date/time, `yyyyMMddhhmmss.sss`
    pub utc_date_time: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Altitude above mean sea level, meters
    pub msl_altitude: Option<f64>,
    /// Speed over ground, km/h
    pub speed_over_ground: Option<f64>,
    /// Course over ground, degrees
    pub course_over_ground: Option<f64>,
    /// Fix mode
    pub fix_mode: Option<u8>,
    /// Reserved by the modem firmware; kept opaque
    pub reserved1: Option<String>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Position dilution of precision
    pub pdop: Option<f64>,
    /// Vertical dilution of precision
    pub vdop: Option<f64>,
    /// Reserved by the modem firmware; kept opaque
    pub reserved2: Option<String>,
    /// Satellites in view
    pub gps_satellites_in_view: Option<u16>,
    /// Reserved by the modem firmware; kept opaque
    pub reserved3: Option<String>,
    /// Horizontal position accuracy
    pub hpa: Option<f64>,
    /// Vertical position accuracy
    pub vpa: Option<f64>,
}

/// The receiver reports all-empty positioning fields while it has no lock.
const NO_LOCK_SENTINEL: &str = ",,,,";

fn parse_field<T: FromStr>(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ParseError> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ParseError {
            field,
            value: raw.to_string(),
        }),
    }
}

impl GnssFix {
    /// Decode a `+CGNSINF: ...` report line against the fixed field schema.
    pub fn decode(report: &str) -> Result<Self, ParseError> {
        let body = report
            .split_once(": ")
            .map(|(_, body)| body)
            .ok_or_else(|| ParseError {
                field: "report",
                value: report.to_string(),
            })?;

        let v: Vec<&str> = body.trim().split(',').collect();
        let at = |i: usize| v.get(i).copied();

        Ok(Self {
            gnss_run_state: parse_field("gnss_run_state", at(0))?,
            gps_fix_status: parse_field("gps_fix_status", at(1))?,
            utc_date_time: parse_field("utc_date_time", at(2))?,
            latitude: parse_field("latitude", at(3))?,
            longitude: parse_field("longitude", at(4))?,
            msl_altitude: parse_field("msl_altitude", at(5))?,
            speed_over_ground: parse_field("speed_over_ground", at(6))?,
            course_over_ground: parse_field("course_over_ground", at(7))?,
            fix_mode: parse_field("fix_mode", at(8))?,
            reserved1: parse_field("reserved1", at(9))?,
            hdop: parse_field("hdop", at(10))?,
            pdop: parse_field("pdop", at(11))?,
            vdop: parse_field("vdop", at(12))?,
            reserved2: parse_field("reserved2", at(13))?,
            gps_satellites_in_view: parse_field("gps_satellites_in_view", at(14))?,
            reserved3: parse_field("reserved3", at(15))?,
            hpa: parse_field("hpa", at(16))?,
            vpa: parse_field("vpa", at(17))?,
        })
    }

    /// Re-encode the fix into the comma-joined report layout.
    pub fn to_report_line(&self) -> String {
        fn cell<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        let cells = [
            cell(&self.gnss_run_state),
            cell(&self.gps_fix_status),
            cell(&self.utc_date_time),
            cell(&self.latitude),
            cell(&self.longitude),
            cell(&self.msl_altitude),
            cell(&self.speed_over_ground),
            cell(&self.course_over_ground),
            cell(&self.fix_mode),
            cell(&self.reserved1),
            cell(&self.hdop),
            cell(&self.pdop),
            cell(&self.vdop),
            cell(&self.reserved2),
            cell(&self.gps_satellites_in_view),
            cell(&self.reserved3),
            cell(&self.hpa),
            cell(&self.vpa),
        ];
        format!("+CGNSINF: {}", cells.join(","))
    }

    /// Whether the core positioning block (latitude, longitude, altitude,
    /// speed over ground) is populated. The receiver emits a well-known
    /// all-empty pattern before it has a lock; that must never pass as a
    /// valid fix.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_some()
            && self.longitude.is_some()
            && self.msl_altitude.is_some()
            && self.speed_over_ground.is_some()
    }

    /// Google Maps search URL for the fix position, if positioned.
    pub fn maps_url(&self) -> Option<String> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        Some(format!(
            "https://www.google.com/maps/search/?api=1&query={lat},{lon}"
        ))
    }
}

/// GNSS polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssConfig {
    /// Sleep between fix queries while the receiver has no lock. Distinct
    /// from (and longer than) the executor's read backoff.
    pub poll_interval: Duration,
    /// Maximum number of fix queries before giving up.
    pub max_polls: usize,
}

impl Default for GnssConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_polls: 60,
        }
    }
}

impl GnssConfig {
    /// Create a config with the default intervals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sleep between fix queries.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the fix query budget.
    #[must_use]
    pub fn max_polls(mut self, polls: usize) -> Self {
        self.max_polls = polls;
        self
    }
}

/// GNSS subsystem session
pub struct GnssSession<'a, T: Transport> {
    executor: &'a mut CommandExecutor<T>,
    config: GnssConfig,
}

impl<'a, T: Transport> GnssSession<'a, T> {
    /// Create a session over a shared executor.
    pub fn new(executor: &'a mut CommandExecutor<T>, config: GnssConfig) -> Self {
        Self { executor, config }
    }

    /// Power on the GNSS receiver. Best effort: a failure is logged as a
    /// warning, not propagated, so it cannot abort the caller.
    pub fn power_on(&mut self) {
        info!("powering on GNSS receiver");
        match self.executor.execute(&Command::new("AT+CGNSPWR=1")) {
            Ok(_) => info!("GNSS power on succeeded"),
            Err(e) => warn!(error = %e, "GNSS power on failed"),
        }
    }

    /// Power off the GNSS receiver. Best effort, like [`Self::power_on`].
    pub fn power_off(&mut self) {
        info!("powering off GNSS receiver");
        match self.executor.execute(&Command::new("AT+CGNSPWR=0")) {
            Ok(_) => info!("GNSS power off succeeded"),
            Err(e) => warn!(error = %e, "GNSS power off failed"),
        }
    }

    /// Poll for a position fix until the receiver has a lock or the poll
    /// budget runs out.
    ///
    /// "Valid reply but no lock yet" sleeps the poll interval and tries
    /// again. Protocol-level failures are logged and retried too, since
    /// the device is known to blip occasionally; transport failures and
    /// decode errors are fatal.
    pub fn acquire_fix(&mut self) -> Result<GnssFix, GnssError> {
        let query = Command::new("AT+CGNSINF")
            .success(&CGNSINF_SUCCESS)
            .extract(&CGNSINF_EXTRACT);

        for poll in 1..=self.config.max_polls {
            info!(poll, "requesting GNSS information");
            match self.executor.execute(&query) {
                Ok(report) if report.contains(NO_LOCK_SENTINEL) => {
                    info!(poll, "waiting for GNSS lock");
                }
                Ok(report) => {
                    debug!(report = %report, "decoding GNSS report");
                    return Ok(GnssFix::decode(&report)?);
                }
                Err(e @ ExecutorError::Transport(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(poll, error = %e, "failed reading from GNSS, will retry");
                }
            }
            std::thread::sleep(self.config.poll_interval);
        }

        Err(GnssError::NoFix {
            polls: self.config.max_polls,
        })
    }
}
