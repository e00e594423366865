//! # Telemetry Agent Library
//!
//! A resilient embedded-style telemetry agent: keeps a wireless link and an
//! MQTT broker session alive, samples an ADC on a non-blocking interval
//! timer, optionally enriches readings with a one-shot HTTP geolocation fix,
//! and publishes a small JSON record to the broker each interval.
//!
//! The library is organized around narrow collaborator traits
//! ([`link::LinkDriver`], [`session::BrokerSession`],
//! [`http::TcpTransport`], [`sensor::AdcSource`]) so the recovery state
//! machine, the HTTP response parser, and the scheduling logic are all
//! testable without hardware or a live network.

pub mod agent;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod link;
pub mod publisher;
pub mod sensor;
pub mod session;
pub mod timer;
