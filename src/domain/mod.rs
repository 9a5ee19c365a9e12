//! Domain models - core business types for shipment reconciliation
//!
//! This module contains the canonical data types used throughout the system:
//! - `Shipment` - the primary business entity and its reconciled state
//! - `StatusEvent` / `SensorReading` / `TemperatureAlert` - timeline entries
//! - `CarrierRecord` / `SensorRecord` - raw intermediate records from adapters
//! - `TemperatureBand` / `TimeWindow` - per-invocation inputs

pub mod shipment;
pub mod types;

// Re-export commonly used types at module level
pub use shipment::{SensorReading, Shipment, StatusEvent, TemperatureAlert};
pub use types::{
    CarrierRecord, CarrierScanEvent, ExcursionType, IngestSummary, Location, RawLocation,
    RawTimestamp, SensorRecord, ShipmentId, ShipmentStatus, TemperatureBand, TimeWindow,
};
