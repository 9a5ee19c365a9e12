//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `carrier` - HTTP client for the carrier tracking feed
//! - `sensor` - HTTP client for the sensor telemetry feed
//! - `store` - storage contract and in-memory implementation
//! - `alert_log` - raised-alert output to file (JSONL format)

pub mod alert_log;
pub mod carrier;
pub mod sensor;
pub mod store;

// Re-export commonly used types
pub use alert_log::AlertLog;
pub use carrier::CarrierClient;
pub use sensor::SensorClient;
pub use store::{MemoryStore, ShipmentStore, StoreError, WriteBatch};

use thiserror::Error;

/// Failure classes shared by both source adapters
///
/// Adapters never retry; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure or timeout - the source could not be reached in time
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source answered but the payload could not be interpreted
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            // Timeouts, connect failures, and protocol errors all mean the
            // source was not usable this cycle
            SourceError::Unavailable(err.to_string())
        }
    }
}
