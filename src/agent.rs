//! # Agent Module
//!
//! The single-owner context and cooperative control loop.
//!
//! All mutable state — the interval timer, the cached geolocation, the
//! sequence counter and the link/session state machine — lives in one
//! [`Agent`] value driven by one loop; no locking, no second mutator.
//! Each iteration: service broker traffic, check and repair connectivity
//! (link before session, always), then poll the timer and publish a record
//! when the interval has elapsed.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Config, ReportMode};
use crate::error::Result;
use crate::geo::GeoResolver;
use crate::http::{HttpClient, TcpTransport};
use crate::link::{ConnectionManager, LinkDriver, RetryPolicy};
use crate::publisher::Publisher;
use crate::sensor::{read_oversampled, AdcSource, OversampleBits};
use crate::session::BrokerSession;
use crate::timer::{IntervalTimer, TickSource};

/// The telemetry agent: configuration plus every piece of mutable state.
pub struct Agent<L, S, R, A, C> {
    config: Config,
    manager: ConnectionManager<L, S, R>,
    adc: A,
    clock: C,
    timer: IntervalTimer,
    publisher: Publisher,
    oversample: OversampleBits,
}

impl<L, S, R, A, C> Agent<L, S, R, A, C>
where
    L: LinkDriver,
    S: BrokerSession,
    R: RetryPolicy,
    A: AdcSource,
    C: TickSource,
{
    /// Assemble the agent. The configuration has already been validated,
    /// so an out-of-range oversample value here is a programming error
    /// surfaced as a sensor error rather than a panic.
    pub fn new(
        config: Config,
        manager: ConnectionManager<L, S, R>,
        adc: A,
        clock: C,
    ) -> Result<Self> {
        let oversample = OversampleBits::from_config(config.sensor.oversample_bits)
            .ok_or_else(|| {
                crate::error::AgentError::Sensor(format!(
                    "oversample_bits {} out of range",
                    config.sensor.oversample_bits
                ))
            })?;
        let publisher = Publisher::new(config.geo.elevation_m);
        Ok(Self {
            config,
            manager,
            adc,
            clock,
            timer: IntervalTimer::new(),
            publisher,
            oversample,
        })
    }

    /// Startup: link hardware init (fatal on failure), link and session
    /// bring-up, then the one-shot geolocation fix when enabled.
    ///
    /// A geolocation failure is fatal only when `geo.required` is set;
    /// otherwise the agent publishes without coordinates.
    pub async fn init<T: TcpTransport>(&mut self, http: &mut HttpClient<T>) -> Result<()> {
        self.manager.init().await?;

        if self.config.geo.enabled {
            let resolver = GeoResolver::new(self.config.geo.provider_host.clone());
            match resolver.resolve(self.manager.link_mut(), http).await {
                Ok(location) => {
                    info!(lat = %location.lat, lon = %location.lon, "geolocation resolved");
                    self.publisher.set_location(location);
                }
                Err(e) if self.config.geo.required => return Err(e),
                Err(e) => warn!("continuing without geolocation: {e}"),
            }
        }
        Ok(())
    }

    /// One iteration of the control loop.
    ///
    /// Never publishes while the session is known disconnected: the repair
    /// step runs first and blocks (by policy) until connectivity is back.
    /// Sensor failures are transient — the publish is skipped, the loop
    /// goes on.
    pub async fn run_tick(&mut self) -> Result<()> {
        self.manager.poll().await;

        let repair = self.manager.ensure_connected().await?;
        if repair.any() {
            debug!(?repair, "connectivity repaired this tick");
        }

        self.timer.start(&self.clock);
        if !self.timer.is_expired(&self.clock, self.config.agent.ping_interval_ms) {
            return Ok(());
        }

        let record = match self.config.agent.mode {
            ReportMode::Ping => Some(self.publisher.ping_record()),
            ReportMode::Sensor => match read_oversampled(&mut self.adc, self.oversample) {
                Ok(value) => Some(self.publisher.sensor_record(value)),
                Err(e) => {
                    warn!("sensor read failed, skipping this interval: {e}");
                    None
                }
            },
        };

        if let Some(record) = record {
            if self.manager.publish(&record).await {
                debug!(%record, "telemetry published");
            }
        }
        self.timer.clear(&self.clock);
        Ok(())
    }

    /// Drive the loop until Ctrl+C or a terminal error.
    pub async fn run(&mut self) -> Result<()> {
        let poll_period = Duration::from_millis(self.config.agent.poll_period_ms);
        info!(
            interval_ms = self.config.agent.ping_interval_ms,
            mode = ?self.config.agent.mode,
            "starting telemetry loop"
        );

        loop {
            self.run_tick().await?;

            tokio::select! {
                _ = tokio::time::sleep(poll_period) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.manager.shutdown().await;
        Ok(())
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}
