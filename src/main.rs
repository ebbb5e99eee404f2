//! sim7080-gps - GNSS fix acquisition and upload tool
//!
//! Powers up the modem's GNSS engine, waits for a position fix, prints it,
//! and optionally POSTs it to an HTTPS endpoint over the modem's own data
//! connection.

use anyhow::Context;
use clap::Parser;
use sim7080::{
    CommandExecutor, ExecutorConfig, GnssConfig, GnssSession, HttpsConfig, HttpsSession,
    NetworkSession, SerialConfig, SerialTransport,
};
use std::time::Duration;
use tracing::{info, warn};

/// GNSS fix acquisition and upload over a SIM7080G modem
#[derive(Parser, Debug)]
#[command(name = "sim7080-gps", version, about, long_about = None)]
struct Cli {
    /// Serial port the modem's AT interface is on
    #[arg(short, long, env = "SIM7080_PORT", default_value = "/dev/ttyUSB2")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Seconds between fix polls
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Maximum number of fix polls before giving up
    #[arg(long, default_value_t = 60)]
    max_polls: usize,

    /// Print the fix as JSON instead of the raw report line
    #[arg(long)]
    json: bool,

    /// POST the fix as JSON to this HTTPS URL after acquisition
    #[arg(long)]
    post_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("starting {} v{}", sim7080::NAME, sim7080::VERSION);

    let config = SerialConfig::new(&cli.port, cli.baud);
    let transport = SerialTransport::open(config)
        .with_context(|| format!("opening modem port {}", cli.port))?;
    let mut executor = CommandExecutor::new(transport, ExecutorConfig::default());

    executor
        .wait_until_ready(10)
        .context("modem did not become responsive")?;

    let gnss_config = GnssConfig::new()
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .max_polls(cli.max_polls);

    let mut gnss = GnssSession::new(&mut executor, gnss_config);
    gnss.power_on();
    let fix = gnss.acquire_fix();
    gnss.power_off();
    let fix = fix.context("no GNSS fix acquired")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&fix)?);
    } else {
        println!("{}", fix.to_report_line());
    }
    if let Some(url) = fix.maps_url() {
        println!("{url}");
    }

    if let Some(post_url) = cli.post_url {
        let mut network = NetworkSession::new(&mut executor);
        if !network.activate() {
            anyhow::bail!("packet-data context could not be activated");
        }

        let body = serde_json::to_string(&fix)?;
        let result =
            HttpsSession::new(&mut executor, HttpsConfig::default()).post(&post_url, &body);

        if !NetworkSession::new(&mut executor).deactivate() {
            warn!("packet-data context did not deactivate cleanly");
        }

        let response = result.with_context(|| format!("POST to {post_url} failed"))?;
        info!(status = response.status, "fix uploaded");
        if !response.body.is_empty() {
            println!("{}", response.body);
        }
    }

    Ok(())
}
