//! Shared types for the coldtrace pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Newtype wrapper for shipment IDs to provide type safety
///
/// Backed by a UUIDv7 string so IDs sort chronologically by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ShipmentId(pub String);

impl ShipmentId {
    /// Generate a new time-sortable shipment ID
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for ShipmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipment status vocabulary used throughout the pipeline
///
/// Carrier-specific status strings are mapped onto this enumeration by the
/// normalizer; unrecognized strings become `Exception` with the original
/// preserved on the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Created,
    InTransit,
    Delivered,
    Exception,
    TemperatureExcursion,
}

impl ShipmentStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Exception => "exception",
            ShipmentStatus::TemperatureExcursion => "temperature_excursion",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the temperature band a reading left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcursionType {
    BelowMin,
    AboveMax,
}

impl ExcursionType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcursionType::BelowMin => "below_min",
            ExcursionType::AboveMax => "above_max",
        }
    }
}

impl std::fmt::Display for ExcursionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location as reported by a source
///
/// Sources report either a coordinate pair or a place name, never both.
/// The two representations are kept distinct; no coercion in either
/// direction (no city lookup, no coordinate guessing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Coordinate { lat: f64, lon: f64 },
    Place(String),
}

/// Allowed temperature band for a shipment, degrees Celsius
///
/// Resolved per invocation by the caller; not persisted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBand {
    pub min: f64,
    pub max: f64,
}

impl TemperatureBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True if the temperature is inside the band (boundaries inclusive)
    #[inline]
    pub fn contains(&self, temperature: f64) -> bool {
        temperature >= self.min && temperature <= self.max
    }
}

/// Half-open time window for sensor report queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }
}

/// Timestamp as delivered by a source - ISO 8601 text or epoch milliseconds
///
/// Kept raw until the normalizer resolves it to UTC, so that text without
/// timezone information can be rejected instead of silently localized.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Text(String),
    EpochMillis(i64),
}

impl<'de> Deserialize<'de> for RawTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<RawTimestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct RawTimestampVisitor;

        impl<'de> Visitor<'de> for RawTimestampVisitor {
            type Value = RawTimestamp;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer timestamp")
            }

            fn visit_str<E>(self, value: &str) -> Result<RawTimestamp, E>
            where
                E: de::Error,
            {
                Ok(RawTimestamp::Text(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<RawTimestamp, E>
            where
                E: de::Error,
            {
                Ok(RawTimestamp::Text(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<RawTimestamp, E>
            where
                E: de::Error,
            {
                Ok(RawTimestamp::EpochMillis(i64::try_from(value).unwrap_or(i64::MAX)))
            }

            fn visit_i64<E>(self, value: i64) -> Result<RawTimestamp, E>
            where
                E: de::Error,
            {
                Ok(RawTimestamp::EpochMillis(value))
            }
        }

        deserializer.deserialize_any(RawTimestampVisitor)
    }
}

/// Location as delivered by a source, before normalization
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawLocation {
    Coordinate { lat: f64, lon: f64 },
    Place(String),
}

/// One scan event from the carrier feed, in source representation
#[derive(Debug, Clone)]
pub struct CarrierScanEvent {
    pub raw_status: String,
    pub raw_location: Option<RawLocation>,
    pub raw_timestamp: RawTimestamp,
}

/// Intermediate record produced by the carrier adapter
///
/// Source-neutral but still raw: timestamps and statuses are in whatever
/// representation the carrier used. The normalizer converts each scan
/// event into a `StatusEvent`.
#[derive(Debug, Clone)]
pub struct CarrierRecord {
    pub tracking_number: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub events: Vec<CarrierScanEvent>,
}

/// Intermediate record produced by the sensor adapter
///
/// Required fields (timestamp, temperature) are optional at this layer
/// because the wire payload may omit them; the normalizer rejects such
/// records as malformed.
#[derive(Debug, Clone)]
pub struct SensorRecord {
    pub sensor_id: String,
    pub raw_timestamp: Option<RawTimestamp>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub raw_location: Option<RawLocation>,
}

/// Result summary of one ingestion cycle
///
/// Duplicate counts are normal idempotent outcomes, not errors. Stale
/// status events were appended to history but arrived too late to advance
/// `current_status`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub new_status_events: usize,
    pub duplicate_status_events: usize,
    pub stale_status_events: usize,
    pub new_readings: usize,
    pub duplicate_readings: usize,
    pub new_alerts: usize,
    pub shipment: super::shipment::Shipment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipment_id_unique_and_sortable() {
        let a = ShipmentId::new();
        let b = ShipmentId::new();

        assert_ne!(a, b);
        assert_eq!(a.0.len(), 36);
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(ShipmentStatus::Created.as_str(), "created");
        assert_eq!(ShipmentStatus::InTransit.as_str(), "in_transit");
        assert_eq!(ShipmentStatus::Delivered.as_str(), "delivered");
        assert_eq!(ShipmentStatus::Exception.as_str(), "exception");
        assert_eq!(ShipmentStatus::TemperatureExcursion.as_str(), "temperature_excursion");
    }

    #[test]
    fn test_band_contains_is_inclusive() {
        let band = TemperatureBand::new(2.0, 8.0);

        assert!(band.contains(2.0));
        assert!(band.contains(8.0));
        assert!(band.contains(5.0));
        assert!(!band.contains(1.9));
        assert!(!band.contains(8.1));
    }

    #[test]
    fn test_raw_timestamp_deserializes_text() {
        let ts: RawTimestamp = serde_json::from_str("\"2024-01-01T00:00:00Z\"").unwrap();
        assert_eq!(ts, RawTimestamp::Text("2024-01-01T00:00:00Z".to_string()));
    }

    #[test]
    fn test_raw_timestamp_deserializes_epoch() {
        let ts: RawTimestamp = serde_json::from_str("1704067200000").unwrap();
        assert_eq!(ts, RawTimestamp::EpochMillis(1704067200000));
    }

    #[test]
    fn test_raw_location_deserializes_both_shapes() {
        let coord: RawLocation = serde_json::from_str(r#"{"lat":40.0,"lon":-75.0}"#).unwrap();
        assert_eq!(coord, RawLocation::Coordinate { lat: 40.0, lon: -75.0 });

        let place: RawLocation = serde_json::from_str("\"Memphis\"").unwrap();
        assert_eq!(place, RawLocation::Place("Memphis".to_string()));
    }
}
