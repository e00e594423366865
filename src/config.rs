//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Everything is deploy-time: there is no CLI beyond the config path and no
//! runtime reconfiguration. Feature toggles (geolocation enrichment,
//! verbose diagnostics, the link-restart compatibility behavior) are plain
//! fields checked at runtime.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub wifi: WifiConfig,
    pub agent: AgentConfig,
    pub sensor: SensorConfig,
    pub geo: GeoConfig,
    pub link: LinkConfig,
}

/// Broker endpoint, credentials and topic
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub key: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Access point credentials, consumed by the link driver
#[derive(Debug, Deserialize, Clone)]
pub struct WifiConfig {
    #[serde(default)]
    pub ssid: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_security")]
    pub security: String,
}

/// Reporting cadence and mode
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u32,

    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,

    #[serde(default)]
    pub mode: ReportMode,

    #[serde(default)]
    pub verbose: bool,
}

/// What each interval's record carries
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Oversampled ADC reading (plus location when enabled)
    #[default]
    Sensor,
    /// Sequence-counter liveness record
    Ping,
}

/// ADC channel and oversampling
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default)]
    pub channel: u8,

    #[serde(default = "default_oversample_bits")]
    pub oversample_bits: u8,

    /// Use the built-in simulated source instead of the IIO channel
    #[serde(default)]
    pub simulate: bool,
}

/// Geolocation enrichment
#[derive(Debug, Deserialize, Clone)]
pub struct GeoConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_geo_provider")]
    pub provider_host: String,

    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Treat a failed startup resolution as fatal instead of publishing
    /// without coordinates
    #[serde(default)]
    pub required: bool,

    /// Fixed elevation placeholder reported alongside the coordinates
    #[serde(default)]
    pub elevation_m: i32,
}

/// Link/session recovery behavior
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Compatibility behavior: restart the link whenever the session drops,
    /// even if the link reports healthy
    #[serde(default)]
    pub restart_link_on_session_drop: bool,
}

// Default value functions
fn default_broker_port() -> u16 { 1883 }
fn default_topic() -> String { "feeds/ping".to_string() }
fn default_client_name() -> String { "pinger".to_string() }

fn default_security() -> String { "wpa2".to_string() }

fn default_ping_interval_ms() -> u32 { 5000 }
fn default_poll_period_ms() -> u64 { 100 }

fn default_oversample_bits() -> u8 { 2 }

fn default_geo_provider() -> String { "ip-api.com".to_string() }
fn default_http_timeout_ms() -> u64 { 3000 }

fn default_retry_delay_ms() -> u64 { 1000 }

const VALID_SECURITY: &[&str] = &["open", "wep", "wpa", "wpa2"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.broker.host.is_empty() {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("broker host cannot be empty")
            ));
        }

        if self.broker.topic.is_empty() {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("broker topic cannot be empty")
            ));
        }

        if self.broker.client_name.is_empty() {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("broker client_name cannot be empty")
            ));
        }

        if !VALID_SECURITY.contains(&self.wifi.security.as_str()) {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("wifi security must be one of: open, wep, wpa, wpa2")
            ));
        }

        if self.agent.ping_interval_ms == 0 || self.agent.ping_interval_ms > 86_400_000 {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("ping_interval_ms must be between 1 and 86400000")
            ));
        }

        if self.agent.poll_period_ms == 0 || self.agent.poll_period_ms > 10_000 {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("poll_period_ms must be between 1 and 10000")
            ));
        }

        if u64::from(self.agent.ping_interval_ms) < self.agent.poll_period_ms {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("ping_interval_ms must be at least poll_period_ms")
            ));
        }

        if self.sensor.oversample_bits > 2 {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("oversample_bits must be 0, 1 or 2")
            ));
        }

        if self.geo.enabled && self.geo.provider_host.is_empty() {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("geo provider_host cannot be empty when enabled")
            ));
        }

        if self.geo.http_timeout_ms == 0 || self.geo.http_timeout_ms > 60_000 {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("http_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.link.retry_delay_ms == 0 || self.link.retry_delay_ms > 60_000 {
            return Err(crate::error::AgentError::Config(
                toml::de::Error::custom("retry_delay_ms must be between 1 and 60000")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod tests_support {
    use super::*;

    /// Baseline valid configuration shared by unit tests across the crate.
    pub fn test_config() -> Config {
        Config {
            broker: BrokerConfig {
                host: "broker.example".to_string(),
                port: default_broker_port(),
                username: "user".to_string(),
                key: "key".to_string(),
                topic: default_topic(),
                client_name: default_client_name(),
            },
            wifi: WifiConfig {
                ssid: "testnet".to_string(),
                password: "hunter2".to_string(),
                security: default_security(),
            },
            agent: AgentConfig {
                ping_interval_ms: default_ping_interval_ms(),
                poll_period_ms: default_poll_period_ms(),
                mode: ReportMode::Sensor,
                verbose: false,
            },
            sensor: SensorConfig {
                channel: 0,
                oversample_bits: default_oversample_bits(),
                simulate: false,
            },
            geo: GeoConfig {
                enabled: false,
                provider_host: default_geo_provider(),
                http_timeout_ms: default_http_timeout_ms(),
                required: false,
                elevation_m: 0,
            },
            link: LinkConfig {
                retry_delay_ms: default_retry_delay_ms(),
                restart_link_on_session_drop: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::test_config as create_valid_config;
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_broker_host() {
        let mut config = create_valid_config();
        config.broker.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_topic() {
        let mut config = create_valid_config();
        config.broker.topic = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_client_name() {
        let mut config = create_valid_config();
        config.broker.client_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_security_mode() {
        let mut config = create_valid_config();
        config.wifi.security = "wpa3".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ping_interval_zero() {
        let mut config = create_valid_config();
        config.agent.ping_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ping_interval_too_high() {
        let mut config = create_valid_config();
        config.agent.ping_interval_ms = 86_400_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_period_zero() {
        let mut config = create_valid_config();
        config.agent.poll_period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_period_exceeding_interval() {
        let mut config = create_valid_config();
        config.agent.ping_interval_ms = 50;
        config.agent.poll_period_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversample_bits_valid_range() {
        for bits in 0..=2 {
            let mut config = create_valid_config();
            config.sensor.oversample_bits = bits;
            assert!(config.validate().is_ok(), "oversample_bits {} should be valid", bits);
        }
    }

    #[test]
    fn test_oversample_bits_out_of_range() {
        let mut config = create_valid_config();
        config.sensor.oversample_bits = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_geo_provider_when_enabled() {
        let mut config = create_valid_config();
        config.geo.enabled = true;
        config.geo.provider_host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_geo_provider_when_disabled() {
        let mut config = create_valid_config();
        config.geo.enabled = false;
        config.geo.provider_host = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_timeout_bounds() {
        let mut config = create_valid_config();
        config.geo.http_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.geo.http_timeout_ms = 60_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_bounds() {
        let mut config = create_valid_config();
        config.link.retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.link.retry_delay_ms = 60_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[broker]
host = "broker.example"
username = "tokenuser"
key = "tokenkey"

[wifi]
ssid = "testnet"
password = "hunter2"

[agent]
mode = "ping"

[sensor]

[geo]

[link]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.topic, "feeds/ping");
        assert_eq!(config.agent.mode, ReportMode::Ping);
        assert_eq!(config.agent.ping_interval_ms, 5000);
        assert_eq!(config.sensor.oversample_bits, 2);
        assert_eq!(config.geo.http_timeout_ms, 3000);
        assert!(!config.link.restart_link_on_session_drop);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[broker]
host = "broker.example"

[wifi]

[agent]

[sensor]
oversample_bits = 7

[geo]

[link]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_broker_port(), 1883);
        assert_eq!(default_topic(), "feeds/ping");
        assert_eq!(default_client_name(), "pinger");
        assert_eq!(default_security(), "wpa2");
        assert_eq!(default_ping_interval_ms(), 5000);
        assert_eq!(default_poll_period_ms(), 100);
        assert_eq!(default_oversample_bits(), 2);
        assert_eq!(default_geo_provider(), "ip-api.com");
        assert_eq!(default_http_timeout_ms(), 3000);
        assert_eq!(default_retry_delay_ms(), 1000);
    }
}
