//! Merge phase of the reconciler
//!
//! Everything here runs under the shipment's serialization token and writes
//! only into a `WriteBatch`; nothing becomes visible before the single
//! commit at the end of each merge.

use super::{IngestError, Reconciler};
use crate::domain::{
    CarrierRecord, IngestSummary, SensorRecord, Shipment, ShipmentId, ShipmentStatus,
    TemperatureBand,
};
use crate::io::store::WriteBatch;
use crate::services::excursion;
use crate::services::normalize::{normalize_sensor, normalize_status};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

impl Reconciler {
    /// Merge an already-fetched carrier record into shipment state
    ///
    /// Split out from `ingest_carrier` so the merge semantics can be driven
    /// without a live carrier endpoint.
    pub async fn merge_carrier_record(
        &self,
        record: CarrierRecord,
    ) -> Result<IngestSummary, IngestError> {
        let lock = self.lock_handle(&record.tracking_number);
        let _guard = lock.lock().await;

        let existing = self.store.get_shipment_by_tracking(&record.tracking_number).await?;
        let created = existing.is_none();
        let mut shipment = match existing {
            Some(shipment) => shipment,
            None => Shipment::new(
                &record.tracking_number,
                record.origin.clone(),
                record.destination.clone(),
            ),
        };
        if !created {
            shipment.update_route(record.origin.clone(), record.destination.clone());
        }

        let mut batch = WriteBatch::default();
        let mut seen: HashSet<(DateTime<Utc>, ShipmentStatus)> = HashSet::new();
        let mut new_events = 0;
        let mut duplicates = 0;
        let mut stale = 0;

        for raw in &record.events {
            let event = normalize_status(&shipment.id, raw)?;

            let key = (event.timestamp, event.status);
            if seen.contains(&key)
                || self.store.has_status_event(&shipment.id, event.timestamp, event.status).await?
            {
                duplicates += 1;
                continue;
            }
            seen.insert(key);

            if !shipment.apply_status(&event) {
                // Late arrival: kept in history for audit, current_status
                // stands
                stale += 1;
                debug!(
                    tracking_number = %record.tracking_number,
                    status = %event.status,
                    ts = %event.timestamp,
                    "stale_status_event"
                );
            }
            new_events += 1;
            batch.status_events.push(event);
        }

        batch.shipment = Some(shipment.clone());
        self.store.commit(batch).await?;

        info!(
            tracking_number = %record.tracking_number,
            created = %created,
            new_events = %new_events,
            duplicates = %duplicates,
            current_status = %shipment.current_status,
            "carrier_cycle_merged"
        );

        Ok(IngestSummary {
            new_status_events: new_events,
            duplicate_status_events: duplicates,
            stale_status_events: stale,
            new_readings: 0,
            duplicate_readings: 0,
            new_alerts: 0,
            shipment,
        })
    }

    /// Merge already-fetched sensor records for one shipment
    ///
    /// Readings are processed in timestamp order; the open-excursion state
    /// is seeded from the store and threaded through the evaluator so
    /// alerts fire once per contiguous excursion, across invocations.
    pub async fn merge_sensor_window(
        &self,
        shipment_id: &ShipmentId,
        records: Vec<SensorRecord>,
        band: TemperatureBand,
    ) -> Result<IngestSummary, IngestError> {
        // Resolve the lock key before taking the lock; shipments are never
        // deleted, so the tracking number is stable
        let tracking_number = self
            .store
            .get_shipment(shipment_id)
            .await?
            .ok_or_else(|| IngestError::UnknownShipment(shipment_id.to_string()))?
            .tracking_number;

        let lock = self.lock_handle(&tracking_number);
        let _guard = lock.lock().await;

        let mut shipment = self
            .store
            .get_shipment(shipment_id)
            .await?
            .ok_or_else(|| IngestError::UnknownShipment(shipment_id.to_string()))?;

        // Normalize the whole window before deciding any write, so a bad
        // record aborts the cycle with the store untouched
        let mut readings = Vec::with_capacity(records.len());
        for record in &records {
            readings.push(normalize_sensor(shipment_id, record)?);
        }
        readings.sort_by_key(|r| r.timestamp);

        let mut open = self.store.get_open_excursion(shipment_id).await?;
        let mut batch = WriteBatch::default();
        let mut seen: HashSet<(DateTime<Utc>, String)> = HashSet::new();
        let mut new_readings = 0;
        let mut duplicates = 0;
        let mut new_alerts = 0;
        let mut new_events = 0;
        let mut stale = 0;

        for mut reading in readings {
            let key = (reading.timestamp, reading.sensor_id.clone());
            if seen.contains(&key)
                || self
                    .store
                    .has_sensor_reading(shipment_id, reading.timestamp, &reading.sensor_id)
                    .await?
            {
                duplicates += 1;
                continue;
            }
            seen.insert(key);

            let evaluation = excursion::evaluate(&reading, &band, open);
            reading.excursion = evaluation.state;
            open = evaluation.state;

            if let Some(decision) = evaluation.decision {
                if !shipment.apply_status(&decision.status_event) {
                    stale += 1;
                }
                new_events += 1;
                new_alerts += 1;
                info!(
                    tracking_number = %tracking_number,
                    alert_type = %decision.alert.alert_type,
                    temperature = %decision.alert.temperature,
                    ts = %decision.alert.timestamp,
                    "temperature_excursion_detected"
                );
                batch.status_events.push(decision.status_event);
                batch.alerts.push(decision.alert);
            }

            batch.readings.push(reading);
            new_readings += 1;
        }

        let raised = batch.alerts.clone();
        batch.shipment = Some(shipment.clone());
        self.store.commit(batch).await?;

        // Egress only after the commit succeeded; a rolled-back cycle must
        // not leak alerts
        if let Some(ref log) = self.alert_log {
            log.write_alerts(&tracking_number, &raised);
        }

        info!(
            tracking_number = %tracking_number,
            new_readings = %new_readings,
            duplicates = %duplicates,
            new_alerts = %new_alerts,
            "sensor_cycle_merged"
        );

        Ok(IngestSummary {
            new_status_events: new_events,
            duplicate_status_events: 0,
            stale_status_events: stale,
            new_readings,
            duplicate_readings: duplicates,
            new_alerts,
            shipment,
        })
    }
}
