//! Shipment reconciliation - the ingestion orchestration core
//!
//! One invocation handles one ingestion request for one shipment and one
//! source: pull from the adapter, normalize, merge into per-shipment state
//! without duplication or ordering violations, evaluate excursions, and
//! commit every resulting write as one atomic batch.
//!
//! Concurrency: cycles for different shipments run freely in parallel;
//! cycles for the same shipment serialize on a keyed lock held only for the
//! merge-and-commit phase. Adapter calls never hold the lock.

mod merge;

use crate::domain::{IngestSummary, ShipmentId, TemperatureBand, TimeWindow};
use crate::infra::metrics::Metrics;
use crate::io::store::{ShipmentStore, StoreError};
use crate::io::{AlertLog, CarrierClient, SensorClient, SourceError};
use crate::services::normalize::NormalizeError;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Failure classes surfaced to ingestion callers
///
/// Every variant means the cycle wrote nothing; retrying the whole
/// ingestion is always safe because merges are idempotent on event
/// identity. Duplicate detection is not an error - it shows up in the
/// summary counts.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source could not be reached; retry with backoff at the caller
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source answered with an uninterpretable payload
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A timestamp's absolute instant could not be determined
    #[error("ambiguous timestamp: {0}")]
    AmbiguousTimestamp(String),

    /// The transaction could not commit; the whole cycle rolled back
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),

    /// Sensor data referenced a shipment that does not exist
    #[error("unknown shipment: {0}")]
    UnknownShipment(String),
}

impl IngestError {
    /// Short class name for structured logs and metrics
    pub fn class(&self) -> &'static str {
        match self {
            IngestError::SourceUnavailable(_) => "source_unavailable",
            IngestError::MalformedPayload(_) => "malformed_payload",
            IngestError::AmbiguousTimestamp(_) => "ambiguous_timestamp",
            IngestError::StorageFailure(_) => "storage_failure",
            IngestError::UnknownShipment(_) => "unknown_shipment",
        }
    }
}

impl From<SourceError> for IngestError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => IngestError::SourceUnavailable(msg),
            SourceError::Malformed(msg) => IngestError::MalformedPayload(msg),
        }
    }
}

impl From<NormalizeError> for IngestError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::AmbiguousTimestamp(msg) => IngestError::AmbiguousTimestamp(msg),
            NormalizeError::Malformed(msg) => IngestError::MalformedPayload(msg),
        }
    }
}

/// Orchestrates ingestion cycles against the storage contract
pub struct Reconciler {
    pub(crate) store: Arc<dyn ShipmentStore>,
    carrier: CarrierClient,
    sensor: SensorClient,
    pub(crate) metrics: Arc<Metrics>,
    /// Optional JSONL egress for raised alerts
    pub(crate) alert_log: Option<AlertLog>,
    /// Per-shipment serialization tokens, keyed by tracking number (the
    /// stable external identity, so two first-sight cycles for the same
    /// unseen tracking number cannot double-create)
    locks: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ShipmentStore>,
        carrier: CarrierClient,
        sensor: SensorClient,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            carrier,
            sensor,
            metrics,
            alert_log: None,
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// Attach an alert egress; raised alerts are appended after each commit
    pub fn with_alert_log(mut self, alert_log: AlertLog) -> Self {
        self.alert_log = Some(alert_log);
        self
    }

    /// Ingest the carrier feed's current view of one tracking number
    ///
    /// Creates the shipment on first sight of the tracking number. Returns
    /// the cycle's summary; on error the store is untouched.
    pub async fn ingest_carrier(&self, tracking_number: &str) -> Result<IngestSummary, IngestError> {
        let result = async {
            let record = self.carrier.fetch_update(tracking_number).await?;
            self.merge_carrier_record(record).await
        }
        .await;
        self.record_outcome("carrier", &result);
        result
    }

    /// Ingest one sensor's reports for a shipment over a time window
    ///
    /// The band is resolved by the caller and applies to this invocation
    /// only. Overlapping windows are safe: already-stored readings are
    /// skipped, alerts fire only for the new portion.
    pub async fn ingest_sensor(
        &self,
        shipment_id: &ShipmentId,
        sensor_ref: &str,
        window: TimeWindow,
        band: TemperatureBand,
    ) -> Result<IngestSummary, IngestError> {
        let result = async {
            let records = self.sensor.fetch_window(sensor_ref, window).await?;
            self.merge_sensor_window(shipment_id, records, band).await
        }
        .await;
        self.record_outcome("sensor", &result);
        result
    }

    /// Get-or-create the serialization token for a tracking number
    pub(crate) fn lock_handle(&self, tracking_number: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(tracking_number.to_string()).or_default())
    }

    fn record_outcome(&self, source: &str, result: &Result<IngestSummary, IngestError>) {
        match result {
            Ok(summary) => self.metrics.record_cycle(summary),
            Err(err) => {
                warn!(source = %source, class = %err.class(), error = %err, "ingest_cycle_failed");
                self.metrics.record_cycle_failed(err.class());
            }
        }
    }
}
