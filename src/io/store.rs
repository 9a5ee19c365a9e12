//! Storage contract and in-memory implementation
//!
//! The reconciler depends on persistence only through the `ShipmentStore`
//! trait: point reads to drive merge decisions, plus a single atomic
//! `commit` that applies one ingestion cycle's writes all-or-nothing.
//! `MemoryStore` is the in-process implementation and the test double for
//! the durable store, which lives outside this crate.

use crate::domain::{
    ExcursionType, SensorReading, Shipment, ShipmentId, ShipmentStatus, StatusEvent,
    TemperatureAlert,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Storage failure classes
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

/// All writes produced by one ingestion cycle
///
/// Gathered during the merge phase and applied by `commit` as one atomic
/// unit. An empty batch is a valid no-op commit.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub shipment: Option<Shipment>,
    pub status_events: Vec<StatusEvent>,
    pub readings: Vec<SensorReading>,
    pub alerts: Vec<TemperatureAlert>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.shipment.is_none()
            && self.status_events.is_empty()
            && self.readings.is_empty()
            && self.alerts.is_empty()
    }
}

/// Persistence interface consumed by the reconciler
///
/// Reads answer merge decisions; writes only happen through `commit`, which
/// must apply the whole batch or nothing. Implementations are shared across
/// concurrent ingestion cycles.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn get_shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>, StoreError>;

    async fn get_shipment_by_tracking(
        &self,
        tracking_number: &str,
    ) -> Result<Option<Shipment>, StoreError>;

    /// True if a status event with this identity triple is already stored
    async fn has_status_event(
        &self,
        id: &ShipmentId,
        timestamp: DateTime<Utc>,
        status: ShipmentStatus,
    ) -> Result<bool, StoreError>;

    /// True if a reading with this identity triple is already stored
    async fn has_sensor_reading(
        &self,
        id: &ShipmentId,
        timestamp: DateTime<Utc>,
        sensor_id: &str,
    ) -> Result<bool, StoreError>;

    /// The excursion state left open by the latest stored reading, if any
    async fn get_open_excursion(
        &self,
        id: &ShipmentId,
    ) -> Result<Option<ExcursionType>, StoreError>;

    /// Apply one cycle's writes atomically
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    shipments: FxHashMap<ShipmentId, Shipment>,
    by_tracking: FxHashMap<String, ShipmentId>,
    status_events: FxHashMap<ShipmentId, Vec<StatusEvent>>,
    readings: FxHashMap<ShipmentId, Vec<SensorReading>>,
    alerts: FxHashMap<ShipmentId, Vec<TemperatureAlert>>,
}

/// In-memory shipment store
///
/// All tables live behind one mutex, so a commit is atomic by construction:
/// no reader observes a partially applied batch. History vectors are kept
/// timestamp-sorted on insert.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail without applying anything
    ///
    /// Test hook for proving the no-partial-writes guarantee.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Status history for a shipment, oldest first
    pub fn status_events(&self, id: &ShipmentId) -> Vec<StatusEvent> {
        self.tables.lock().status_events.get(id).cloned().unwrap_or_default()
    }

    /// Stored readings for a shipment, oldest first
    pub fn readings(&self, id: &ShipmentId) -> Vec<SensorReading> {
        self.tables.lock().readings.get(id).cloned().unwrap_or_default()
    }

    /// Raised alerts for a shipment, oldest first
    pub fn alerts(&self, id: &ShipmentId) -> Vec<TemperatureAlert> {
        self.tables.lock().alerts.get(id).cloned().unwrap_or_default()
    }

    pub fn shipment_count(&self) -> usize {
        self.tables.lock().shipments.len()
    }
}

/// Insert keeping the vector sorted by timestamp (stable for equal keys)
fn insert_sorted<T>(items: &mut Vec<T>, item: T, ts: impl Fn(&T) -> DateTime<Utc>) {
    let key = ts(&item);
    let idx = items.partition_point(|existing| ts(existing) <= key);
    items.insert(idx, item);
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn get_shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>, StoreError> {
        Ok(self.tables.lock().shipments.get(id).cloned())
    }

    async fn get_shipment_by_tracking(
        &self,
        tracking_number: &str,
    ) -> Result<Option<Shipment>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .by_tracking
            .get(tracking_number)
            .and_then(|id| tables.shipments.get(id))
            .cloned())
    }

    async fn has_status_event(
        &self,
        id: &ShipmentId,
        timestamp: DateTime<Utc>,
        status: ShipmentStatus,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .status_events
            .get(id)
            .is_some_and(|events| {
                events.iter().any(|e| e.timestamp == timestamp && e.status == status)
            }))
    }

    async fn has_sensor_reading(
        &self,
        id: &ShipmentId,
        timestamp: DateTime<Utc>,
        sensor_id: &str,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .readings
            .get(id)
            .is_some_and(|readings| {
                readings.iter().any(|r| r.timestamp == timestamp && r.sensor_id == sensor_id)
            }))
    }

    async fn get_open_excursion(
        &self,
        id: &ShipmentId,
    ) -> Result<Option<ExcursionType>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.readings.get(id).and_then(|readings| readings.last()).and_then(|r| r.excursion))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::CommitFailed("injected commit failure".to_string()));
        }

        let mut tables = self.tables.lock();

        if let Some(shipment) = batch.shipment {
            tables.by_tracking.insert(shipment.tracking_number.clone(), shipment.id.clone());
            tables.shipments.insert(shipment.id.clone(), shipment);
        }
        for event in batch.status_events {
            let history = tables.status_events.entry(event.shipment_id.clone()).or_default();
            insert_sorted(history, event, |e| e.timestamp);
        }
        for reading in batch.readings {
            let readings = tables.readings.entry(reading.shipment_id.clone()).or_default();
            insert_sorted(readings, reading, |r| r.timestamp);
        }
        for alert in batch.alerts {
            let alerts = tables.alerts.entry(alert.shipment_id.clone()).or_default();
            insert_sorted(alerts, alert, |a| a.timestamp);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn reading(id: &ShipmentId, secs: i64, temp: f64, exc: Option<ExcursionType>) -> SensorReading {
        SensorReading {
            shipment_id: id.clone(),
            sensor_id: "S1".to_string(),
            timestamp: ts(secs),
            temperature: temp,
            humidity: None,
            location: None,
            excursion: exc,
        }
    }

    #[tokio::test]
    async fn test_commit_and_lookup() {
        let store = MemoryStore::new();
        let shipment = Shipment::new("T1", Some("Memphis".to_string()), None);
        let id = shipment.id.clone();

        store
            .commit(WriteBatch { shipment: Some(shipment), ..Default::default() })
            .await
            .unwrap();

        let by_id = store.get_shipment(&id).await.unwrap().unwrap();
        let by_tracking = store.get_shipment_by_tracking("T1").await.unwrap().unwrap();
        assert_eq!(by_id, by_tracking);
        assert!(store.get_shipment_by_tracking("T2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_history_kept_sorted() {
        let store = MemoryStore::new();
        let id = ShipmentId::new();

        let batch = WriteBatch {
            status_events: vec![
                StatusEvent::new(id.clone(), ShipmentStatus::Delivered, ts(3000)),
                StatusEvent::new(id.clone(), ShipmentStatus::Created, ts(1000)),
                StatusEvent::new(id.clone(), ShipmentStatus::InTransit, ts(2000)),
            ],
            ..Default::default()
        };
        store.commit(batch).await.unwrap();

        let history = store.status_events(&id);
        let stamps: Vec<_> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![ts(1000), ts(2000), ts(3000)]);
    }

    #[tokio::test]
    async fn test_identity_probes() {
        let store = MemoryStore::new();
        let id = ShipmentId::new();

        let batch = WriteBatch {
            status_events: vec![StatusEvent::new(id.clone(), ShipmentStatus::InTransit, ts(1000))
                .with_location(Location::Place("Memphis".to_string()))],
            readings: vec![reading(&id, 1000, 5.0, None)],
            ..Default::default()
        };
        store.commit(batch).await.unwrap();

        assert!(store.has_status_event(&id, ts(1000), ShipmentStatus::InTransit).await.unwrap());
        // Same timestamp, different status: a different identity
        assert!(!store.has_status_event(&id, ts(1000), ShipmentStatus::Delivered).await.unwrap());
        assert!(store.has_sensor_reading(&id, ts(1000), "S1").await.unwrap());
        assert!(!store.has_sensor_reading(&id, ts(1000), "S2").await.unwrap());
        assert!(!store.has_sensor_reading(&id, ts(2000), "S1").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_excursion_follows_latest_reading() {
        let store = MemoryStore::new();
        let id = ShipmentId::new();

        store
            .commit(WriteBatch {
                readings: vec![
                    reading(&id, 1000, 9.0, Some(ExcursionType::AboveMax)),
                    reading(&id, 2000, 5.0, None),
                ],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.get_open_excursion(&id).await.unwrap(), None);

        store
            .commit(WriteBatch {
                readings: vec![reading(&id, 3000, 1.0, Some(ExcursionType::BelowMin))],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            store.get_open_excursion(&id).await.unwrap(),
            Some(ExcursionType::BelowMin)
        );
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        let shipment = Shipment::new("T1", None, None);
        let id = shipment.id.clone();

        store.fail_next_commit();
        let batch = WriteBatch {
            shipment: Some(shipment),
            status_events: vec![StatusEvent::new(id.clone(), ShipmentStatus::InTransit, ts(1000))],
            ..Default::default()
        };
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::CommitFailed(_)));

        assert_eq!(store.shipment_count(), 0);
        assert!(store.status_events(&id).is_empty());

        // Only the next commit fails; the one after goes through
        let shipment = Shipment::new("T1", None, None);
        store
            .commit(WriteBatch { shipment: Some(shipment), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(store.shipment_count(), 1);
    }
}
