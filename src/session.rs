//! # Broker Session Module
//!
//! The publish/subscribe session with the telemetry broker, behind a narrow
//! trait so the recovery state machine can be tested without a broker.
//!
//! The production implementation wraps `rumqttc`. Its event loop is driven
//! from [`BrokerSession::poll`], which the agent calls every tick; `connect`
//! is considered successful only once the broker's CONNACK arrives.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, warn};

/// How long `connect` waits for the broker's CONNACK.
const CONNACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for servicing the event loop on one tick. Keeps `poll`
/// effectively non-blocking for the cooperative control loop.
const POLL_BUDGET: Duration = Duration::from_millis(10);

/// MQTT keep-alive negotiated with the broker.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Outstanding-request capacity of the client channel.
const CLIENT_CAPACITY: usize = 16;

/// Operations the agent needs from the broker session client.
#[async_trait]
pub trait BrokerSession: Send {
    /// Open an authenticated session. False means "retry later".
    async fn connect(&mut self, client_name: &str, username: &str, key: &str) -> bool;

    /// Session health as currently known.
    fn is_connected(&self) -> bool;

    /// Tear the session down. Safe to call when already disconnected.
    async fn disconnect(&mut self);

    /// Publish a payload. False on failure; the caller decides whether the
    /// session needs repair.
    async fn publish(&mut self, topic: &str, payload: &str) -> bool;

    /// Service incoming protocol traffic. Must be called every tick.
    async fn poll(&mut self);
}

/// Production session over `rumqttc`.
pub struct MqttSession {
    host: String,
    port: u16,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    connected: bool,
}

impl MqttSession {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: None,
            eventloop: None,
            connected: false,
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                debug!("broker acknowledged connection");
                self.connected = true;
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("broker sent disconnect");
                self.connected = false;
            }
            other => {
                debug!(?other, "broker event");
            }
        }
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self, client_name: &str, username: &str, key: &str) -> bool {
        let mut options = MqttOptions::new(client_name, &self.host, self.port);
        options.set_credentials(username, key);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);

        // The first successful poll carries the CONNACK
        match tokio::time::timeout(CONNACK_TIMEOUT, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                debug!(?ack, "session established");
                self.client = Some(client);
                self.eventloop = Some(eventloop);
                self.connected = true;
                true
            }
            Ok(Ok(event)) => {
                warn!(?event, "unexpected event while awaiting CONNACK");
                false
            }
            Ok(Err(e)) => {
                warn!("broker connect failed: {e}");
                false
            }
            Err(_) => {
                warn!("broker connect timed out");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.disconnect().await;
        }
        self.eventloop = None;
        self.connected = false;
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> bool {
        let Some(client) = self.client.as_ref() else {
            return false;
        };
        match client.publish(topic, QoS::AtMostOnce, false, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("publish enqueue failed: {e}");
                self.connected = false;
                false
            }
        }
    }

    async fn poll(&mut self) {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return;
        };
        // Drain whatever is ready within the tick budget
        match tokio::time::timeout(POLL_BUDGET, eventloop.poll()).await {
            Ok(Ok(event)) => self.handle_event(event),
            Ok(Err(e)) => {
                warn!("session lost: {e}");
                self.connected = false;
            }
            Err(_) => {} // nothing pending this tick
        }
    }
}
