//! Shipment data model - the per-shipment timeline and its entries

use crate::domain::types::{ExcursionType, Location, ShipmentId, ShipmentStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tracked shipment and its current reconciled state
///
/// Created on first ingestion of an unseen tracking number, mutated only by
/// the reconciler, never deleted by the pipeline. `current_status` always
/// equals the status of the most-recent-timestamped history entry;
/// `current_status_at` carries that entry's timestamp so the monotonic rule
/// can be enforced without scanning history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub tracking_number: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub current_status: ShipmentStatus,
    pub current_status_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Create a shipment for a tracking number seen for the first time
    pub fn new(tracking_number: &str, origin: Option<String>, destination: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ShipmentId::new(),
            tracking_number: tracking_number.to_string(),
            origin,
            destination,
            current_status: ShipmentStatus::Created,
            current_status_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an accepted status event to the shipment's current state
    ///
    /// Returns true if the event advanced `current_status`. An event with a
    /// timestamp earlier than the latest known status timestamp is stale: it
    /// belongs in history for audit but never regresses the current status.
    pub fn apply_status(&mut self, event: &StatusEvent) -> bool {
        if let Some(at) = self.current_status_at {
            if event.timestamp < at {
                return false;
            }
        }
        self.current_status = event.status;
        self.current_status_at = Some(event.timestamp);
        self.updated_at = Utc::now();
        true
    }

    /// Refresh origin/destination from a newer carrier payload
    pub fn update_route(&mut self, origin: Option<String>, destination: Option<String>) {
        if origin.is_some() && origin != self.origin {
            self.origin = origin;
            self.updated_at = Utc::now();
        }
        if destination.is_some() && destination != self.destination {
            self.destination = destination;
            self.updated_at = Utc::now();
        }
    }
}

/// One entry in a shipment's status history
///
/// Identity is the `(shipment_id, timestamp, status)` triple; entries with
/// an identical triple are idempotent no-ops on merge. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub shipment_id: ShipmentId,
    pub status: ShipmentStatus,
    /// Original source string, preserved when vocabulary mapping fell back
    /// to `Exception`
    pub raw_status: Option<String>,
    pub location: Option<Location>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(shipment_id: ShipmentId, status: ShipmentStatus, timestamp: DateTime<Utc>) -> Self {
        Self { shipment_id, status, raw_status: None, location: None, timestamp }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_raw_status(mut self, raw: &str) -> Self {
        self.raw_status = Some(raw.to_string());
        self
    }
}

/// One normalized sensor reading
///
/// Identity is the `(shipment_id, timestamp, sensor_id)` triple; immutable
/// once stored. `excursion` is the reading's classification against the
/// band in force when it was ingested, stamped by the reconciler before
/// commit - the latest-timestamped reading's classification is what the
/// store reports as the open excursion state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub shipment_id: ShipmentId,
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub location: Option<Location>,
    pub excursion: Option<ExcursionType>,
}

/// Alert raised on transition into a temperature excursion
///
/// Identity is `(shipment_id, timestamp)`. Exactly one alert per contiguous
/// excursion run; never mutated. There is no explicit "closed" record - a
/// later in-band reading is the close signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureAlert {
    pub shipment_id: ShipmentId,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub alert_type: ExcursionType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_new_shipment() {
        let shipment = Shipment::new("T1", Some("Reykjavik".to_string()), None);

        assert_eq!(shipment.tracking_number, "T1");
        assert_eq!(shipment.origin.as_deref(), Some("Reykjavik"));
        assert!(shipment.destination.is_none());
        assert_eq!(shipment.current_status, ShipmentStatus::Created);
        assert!(shipment.current_status_at.is_none());
        assert!(!shipment.id.0.is_empty());
    }

    #[test]
    fn test_apply_status_advances() {
        let mut shipment = Shipment::new("T1", None, None);
        let event = StatusEvent::new(shipment.id.clone(), ShipmentStatus::InTransit, ts(1000));

        assert!(shipment.apply_status(&event));
        assert_eq!(shipment.current_status, ShipmentStatus::InTransit);
        assert_eq!(shipment.current_status_at, Some(ts(1000)));
    }

    #[test]
    fn test_apply_status_rejects_stale() {
        let mut shipment = Shipment::new("T1", None, None);
        shipment.apply_status(&StatusEvent::new(
            shipment.id.clone(),
            ShipmentStatus::Delivered,
            ts(2000),
        ));

        let late = StatusEvent::new(shipment.id.clone(), ShipmentStatus::InTransit, ts(1000));
        assert!(!shipment.apply_status(&late));
        assert_eq!(shipment.current_status, ShipmentStatus::Delivered);
        assert_eq!(shipment.current_status_at, Some(ts(2000)));
    }

    #[test]
    fn test_apply_status_equal_timestamp_advances() {
        let mut shipment = Shipment::new("T1", None, None);
        shipment.apply_status(&StatusEvent::new(
            shipment.id.clone(),
            ShipmentStatus::InTransit,
            ts(1000),
        ));

        // Same instant, different status: the newer event wins
        let event = StatusEvent::new(
            shipment.id.clone(),
            ShipmentStatus::TemperatureExcursion,
            ts(1000),
        );
        assert!(shipment.apply_status(&event));
        assert_eq!(shipment.current_status, ShipmentStatus::TemperatureExcursion);
    }

    #[test]
    fn test_update_route_fills_missing() {
        let mut shipment = Shipment::new("T1", None, None);
        shipment.update_route(Some("Memphis".to_string()), Some("Oslo".to_string()));

        assert_eq!(shipment.origin.as_deref(), Some("Memphis"));
        assert_eq!(shipment.destination.as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_status_event_builder() {
        let id = ShipmentId::new();
        let event = StatusEvent::new(id.clone(), ShipmentStatus::Exception, ts(500))
            .with_location(Location::Place("Keflavik".to_string()))
            .with_raw_status("CLEARANCE_DELAY");

        assert_eq!(event.shipment_id, id);
        assert_eq!(event.status, ShipmentStatus::Exception);
        assert_eq!(event.raw_status.as_deref(), Some("CLEARANCE_DELAY"));
        assert_eq!(event.location, Some(Location::Place("Keflavik".to_string())));
    }
}
