//! # Error Types
//!
//! Custom error types for the telemetry agent using `thiserror`.

use thiserror::Error;

use crate::http::HttpError;

/// Main error type for the telemetry agent.
///
/// `LinkInit` is terminal: the link hardware itself failed to initialize
/// and no amount of retrying will help. Everything else is either handled
/// inside the link manager or a typed parse/resource failure the caller
/// can choose to degrade on.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Link hardware failed to initialize (terminal, no recovery)
    #[error("link hardware failed to initialize: {0}")]
    LinkInit(String),

    /// A bounded retry policy ran out of attempts
    #[error("retry budget exhausted after {0} attempts")]
    RetriesExhausted(u32),

    /// HTTP client errors (resolution, connect, parse, oversized body)
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Geolocation response did not match the expected `<lat>,<lon>` shape
    #[error("malformed geolocation response: {0}")]
    GeoParse(String),

    /// Sensor read errors
    #[error("sensor read failed: {0}")]
    Sensor(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the telemetry agent
pub type Result<T> = std::result::Result<T, AgentError>;
