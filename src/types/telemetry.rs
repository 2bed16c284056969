//! Telemetry wire and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AlertLevel;

/// Errors from decoding an inbound telemetry payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("vehicle_id must be non-empty")]
    MissingVehicleId,

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// One telemetry sample as sent by a vehicle.
///
/// Wire format (JSON):
/// `{"vehicle_id": "Bus-01", "speed": 87.2, "rpm": 2100, "fuel_level": 64.5}`.
/// Vehicles may attach extra fields (a device timestamp, for example); those
/// are ignored by the parser but still participate in the raw-byte identity
/// hash because the hash covers the message exactly as delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub vehicle_id: String,
    /// Speed over ground (km/h)
    #[serde(default)]
    pub speed: f64,
    /// Engine revolutions per minute
    #[serde(default)]
    pub rpm: u32,
    /// Fuel tank level (percent, 0-100)
    #[serde(default = "default_fuel_level")]
    pub fuel_level: f64,
    /// Engaged gear, if the vehicle reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<u8>,
}

fn default_fuel_level() -> f64 {
    100.0
}

impl TelemetryReading {
    /// Decode and validate a raw device payload.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let reading: Self = serde_json::from_slice(raw)?;
        if reading.vehicle_id.trim().is_empty() {
            return Err(ParseError::MissingVehicleId);
        }
        if !reading.speed.is_finite() || reading.speed < 0.0 {
            return Err(ParseError::OutOfRange {
                field: "speed",
                value: reading.speed,
            });
        }
        if !reading.fuel_level.is_finite() || !(0.0..=100.0).contains(&reading.fuel_level) {
            return Err(ParseError::OutOfRange {
                field: "fuel_level",
                value: reading.fuel_level,
            });
        }
        Ok(reading)
    }
}

/// The persisted, enrichable representation of a reading.
///
/// Created by the ingest stage with empty advice; the enrichment stage later
/// patches `advice` and `alert_level` (and nothing else) via read-modify-write
/// against the identity key. Records are never deleted by pipeline logic -
/// deletion is an administrative API operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Content-derived identity: SHA-256 hex digest of the raw message bytes
    pub id: String,
    pub vehicle_id: String,
    /// Observation time (UTC)
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    pub rpm: u32,
    pub fuel_level: f64,
    /// Driving advice; empty until enriched
    #[serde(default)]
    pub advice: String,
    #[serde(default)]
    pub alert_level: AlertLevel,
    /// When the relay processed the reading (UTC)
    pub processed_at: DateTime<Utc>,
}

impl TelemetryRecord {
    /// Build the initial (un-advised) record for a freshly parsed reading.
    pub fn new(id: String, reading: &TelemetryReading, now: DateTime<Utc>) -> Self {
        Self {
            id,
            vehicle_id: reading.vehicle_id.clone(),
            timestamp: now,
            speed: reading.speed,
            rpm: reading.rpm,
            fuel_level: reading.fuel_level,
            advice: String::new(),
            alert_level: AlertLevel::Info,
            processed_at: now,
        }
    }
}

/// The queued hand-off from ingest to enrichment.
///
/// Carries the numeric fields alongside the record id so the enrichment stage
/// can evaluate the advisory without a store read on its hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub record_id: String,
    pub vehicle_id: String,
    pub speed: f64,
    pub rpm: u32,
    pub fuel_level: f64,
}

impl EnrichmentRequest {
    /// The enrichment request for a just-ingested record.
    pub fn for_record(record: &TelemetryRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            vehicle_id: record.vehicle_id.clone(),
            speed: record.speed,
            rpm: record.rpm,
            fuel_level: record.fuel_level,
        }
    }
}
