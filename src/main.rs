//! # Telemetry Agent
//!
//! Keeps a wireless link and an MQTT broker session alive, samples an ADC
//! on a fixed interval and publishes the reading — optionally enriched with
//! a one-shot geolocation fix — to the broker.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load and validate the TOML configuration
//!    - Set up logging with tracing subscriber
//!    - Bring up the link and the broker session (blocking retries)
//!    - Resolve geolocation once, if enabled
//!
//! 2. **Main Loop**
//!    - Service broker traffic and repair connectivity every iteration
//!    - Publish one telemetry record per configured interval
//!    - Handle Ctrl+C for graceful shutdown
//!
//! A fatal link-hardware failure surfaces as an error return from `main`,
//! not a hang: the process exits non-zero and the supervisor decides.

use anyhow::Result;
use tracing::info;

use telemetry_agent::agent::Agent;
use telemetry_agent::config::Config;
use telemetry_agent::http::{HttpClient, TokioTcp};
use telemetry_agent::link::{ConnectionManager, FixedDelay, HostLink};
use telemetry_agent::sensor::{AdcSource, IioAdc, SimulatedAdc};
use telemetry_agent::session::MqttSession;
use telemetry_agent::timer::MonotonicClock;

/// Configuration file used when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;

    // Verbose diagnostics raise the default level; RUST_LOG still wins
    let default_level = if config.agent.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    info!("telemetry-agent v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        config = %config_path,
        broker = %config.broker.host,
        topic = %config.broker.topic,
        "configuration loaded"
    );

    let link = HostLink::new();
    let session = MqttSession::new(config.broker.host.clone(), config.broker.port);
    let retry = FixedDelay::new(config.link.retry_delay_ms);
    let manager = ConnectionManager::new(
        link,
        session,
        retry,
        config.wifi.clone(),
        config.broker.clone(),
        config.link.restart_link_on_session_drop,
    );

    let adc: Box<dyn AdcSource + Send> = if config.sensor.simulate {
        info!("using simulated ADC source");
        Box::new(SimulatedAdc::default())
    } else {
        info!(channel = config.sensor.channel, "using IIO ADC channel");
        Box::new(IioAdc::new(config.sensor.channel))
    };

    let mut http = HttpClient::new(TokioTcp::new(), config.geo.http_timeout_ms);
    let mut agent = Agent::new(config, manager, adc, MonotonicClock::new())?;

    agent.init(&mut http).await?;
    agent.run().await?;

    info!("telemetry agent stopped");
    Ok(())
}
