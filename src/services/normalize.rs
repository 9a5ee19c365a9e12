//! Normalization of raw source records into the unified event model
//!
//! Pure, stateless transforms. Three concerns:
//! - timestamps: offset-aware text and epoch milliseconds both resolve to
//!   UTC; text without timezone information is rejected, never localized
//! - locations: coordinate pairs and place names stay what they are
//! - status vocabulary: carrier strings map onto the internal enumeration,
//!   unrecognized ones become `exception` with the original preserved

use crate::domain::{
    CarrierScanEvent, Location, RawLocation, RawTimestamp, SensorReading, SensorRecord,
    ShipmentId, ShipmentStatus, StatusEvent,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Normalization failure classes
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The timestamp parses but carries no timezone or epoch anchor, so its
    /// absolute instant cannot be determined
    #[error("ambiguous timestamp: {0}")]
    AmbiguousTimestamp(String),

    /// The record cannot be interpreted at all
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Naive datetime layouts some sources emit without an offset
const NAIVE_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Resolve a raw source timestamp to a UTC instant
pub fn normalize_timestamp(raw: &RawTimestamp) -> Result<DateTime<Utc>, NormalizeError> {
    match raw {
        RawTimestamp::Text(text) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Ok(dt.with_timezone(&Utc));
            }
            // A parseable naive datetime is ambiguous, not malformed: the
            // wall-clock is readable but the instant is not
            for format in NAIVE_FORMATS {
                if NaiveDateTime::parse_from_str(text, format).is_ok() {
                    return Err(NormalizeError::AmbiguousTimestamp(text.clone()));
                }
            }
            Err(NormalizeError::Malformed(format!("unparseable timestamp: {}", text)))
        }
        RawTimestamp::EpochMillis(ms) => Utc
            .timestamp_millis_opt(*ms)
            .single()
            .ok_or_else(|| NormalizeError::Malformed(format!("epoch out of range: {}", ms))),
    }
}

/// Keep the source's location representation, whichever it used
pub fn normalize_location(raw: Option<&RawLocation>) -> Option<Location> {
    match raw {
        Some(RawLocation::Coordinate { lat, lon }) => {
            Some(Location::Coordinate { lat: *lat, lon: *lon })
        }
        Some(RawLocation::Place(name)) => Some(Location::Place(name.clone())),
        None => None,
    }
}

/// Map a carrier status string onto the internal vocabulary
///
/// Returns the mapped status plus the original string when the mapping had
/// to fall back to `Exception`.
pub fn map_status(raw: &str) -> (ShipmentStatus, Option<String>) {
    let canonical = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let status = match canonical.as_str() {
        "created" | "label_created" | "order_created" | "information_received" => {
            ShipmentStatus::Created
        }
        "in_transit" | "picked_up" | "departed" | "arrived" | "arrived_at_facility"
        | "out_for_delivery" | "on_vehicle_for_delivery" | "at_local_facility" => {
            ShipmentStatus::InTransit
        }
        "delivered" => ShipmentStatus::Delivered,
        "exception" | "delay" | "clearance_delay" | "delivery_exception" => {
            ShipmentStatus::Exception
        }
        _ => return (ShipmentStatus::Exception, Some(raw.to_string())),
    };
    (status, None)
}

/// Normalize one carrier scan event into a status history entry
pub fn normalize_status(
    shipment_id: &ShipmentId,
    event: &CarrierScanEvent,
) -> Result<StatusEvent, NormalizeError> {
    let timestamp = normalize_timestamp(&event.raw_timestamp)?;
    let (status, raw_status) = map_status(&event.raw_status);

    let mut normalized = StatusEvent::new(shipment_id.clone(), status, timestamp);
    normalized.raw_status = raw_status;
    normalized.location = normalize_location(event.raw_location.as_ref());
    Ok(normalized)
}

/// Normalize one sensor record into a reading
///
/// Timestamp and temperature are required; a record missing either is
/// malformed and aborts the cycle.
pub fn normalize_sensor(
    shipment_id: &ShipmentId,
    record: &SensorRecord,
) -> Result<SensorReading, NormalizeError> {
    let raw_timestamp = record.raw_timestamp.as_ref().ok_or_else(|| {
        NormalizeError::Malformed(format!("sensor {} report missing timestamp", record.sensor_id))
    })?;
    let temperature = record.temperature.ok_or_else(|| {
        NormalizeError::Malformed(format!("sensor {} report missing temperature", record.sensor_id))
    })?;

    Ok(SensorReading {
        shipment_id: shipment_id.clone(),
        sensor_id: record.sensor_id.clone(),
        timestamp: normalize_timestamp(raw_timestamp)?,
        temperature,
        humidity: record.humidity,
        location: normalize_location(record.raw_location.as_ref()),
        excursion: None,
    })
}
