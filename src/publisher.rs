//! # Telemetry Publisher Module
//!
//! Assembles the outbound record for each reporting interval.
//!
//! Two record shapes exist:
//! - **sensor**: the latest oversampled reading, enriched with the cached
//!   coordinates and a fixed elevation when geolocation is enabled;
//! - **ping**: a liveness record carrying only a monotonically incrementing
//!   sequence counter, for deployments that just want a heartbeat.
//!
//! The sequence counter is owned here and nowhere else; it wraps at `u32`.

use serde::Serialize;

use crate::geo::GeoCoordinate;

/// One serialized telemetry record. Optional fields are omitted from the
/// JSON entirely when absent.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TelemetryPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

/// Builds telemetry records from the latest reading and cached location.
#[derive(Debug, Default)]
pub struct Publisher {
    sequence: u32,
    location: Option<GeoCoordinate>,
    elevation_m: i32,
}

impl Publisher {
    pub fn new(elevation_m: i32) -> Self {
        Self { sequence: 0, location: None, elevation_m }
    }

    /// Cache the startup geolocation fix for all subsequent records.
    pub fn set_location(&mut self, location: GeoCoordinate) {
        self.location = Some(location);
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Serialize a sensor reading, enriched with the cached location when
    /// one was resolved.
    pub fn sensor_record(&self, value: u32) -> String {
        let payload = TelemetryPayload {
            value: Some(value),
            lat: self.location.as_ref().map(|g| g.lat.clone()),
            lon: self.location.as_ref().map(|g| g.lon.clone()),
            elevation: self.location.as_ref().map(|_| self.elevation_m),
            sequence: None,
        };
        serialize(&payload)
    }

    /// Serialize a liveness record and advance the sequence counter.
    pub fn ping_record(&mut self) -> String {
        self.sequence = self.sequence.wrapping_add(1);
        let payload = TelemetryPayload {
            value: None,
            lat: None,
            lon: None,
            elevation: None,
            sequence: Some(self.sequence),
        };
        serialize(&payload)
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

fn serialize(payload: &TelemetryPayload) -> String {
    // A struct of integers and strings cannot fail to serialize; fall back
    // to an empty record rather than poisoning the publish path.
    serde_json::to_string(payload).unwrap_or_else(|_| String::from("{}"))
}
