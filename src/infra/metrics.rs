//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::IngestSummary;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free metrics collector for ingestion cycles
#[derive(Default)]
pub struct Metrics {
    /// Cycles that merged and committed (monotonic)
    cycles_completed: AtomicU64,
    /// Cycles that aborted with an error (monotonic)
    cycles_failed: AtomicU64,
    /// Status events appended to history (monotonic)
    status_events_new: AtomicU64,
    /// Status events skipped as identity duplicates (monotonic)
    status_events_duplicate: AtomicU64,
    /// Status events stored but too late to advance current_status
    status_events_stale: AtomicU64,
    /// Sensor readings stored (monotonic)
    readings_new: AtomicU64,
    /// Sensor readings skipped as identity duplicates (monotonic)
    readings_duplicate: AtomicU64,
    /// Temperature alerts raised (monotonic)
    alerts_raised: AtomicU64,
    /// Cycles failed on source fetch or payload interpretation
    source_errors: AtomicU64,
    /// Cycles failed on commit
    storage_errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed cycle's summary counts
    pub fn record_cycle(&self, summary: &IngestSummary) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.status_events_new.fetch_add(summary.new_status_events as u64, Ordering::Relaxed);
        self.status_events_duplicate
            .fetch_add(summary.duplicate_status_events as u64, Ordering::Relaxed);
        self.status_events_stale.fetch_add(summary.stale_status_events as u64, Ordering::Relaxed);
        self.readings_new.fetch_add(summary.new_readings as u64, Ordering::Relaxed);
        self.readings_duplicate.fetch_add(summary.duplicate_readings as u64, Ordering::Relaxed);
        self.alerts_raised.fetch_add(summary.new_alerts as u64, Ordering::Relaxed);
    }

    /// Record a failed cycle by its error class
    pub fn record_cycle_failed(&self, class: &str) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        match class {
            "source_unavailable" | "malformed_payload" | "ambiguous_timestamp" => {
                self.source_errors.fetch_add(1, Ordering::Relaxed);
            }
            "storage_failure" => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Snapshot current totals
    pub fn report(&self) -> MetricsSummary {
        MetricsSummary {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            status_events_new: self.status_events_new.load(Ordering::Relaxed),
            status_events_duplicate: self.status_events_duplicate.load(Ordering::Relaxed),
            status_events_stale: self.status_events_stale.load(Ordering::Relaxed),
            readings_new: self.readings_new.load(Ordering::Relaxed),
            readings_duplicate: self.readings_duplicate.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time totals for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub status_events_new: u64,
    pub status_events_duplicate: u64,
    pub status_events_stale: u64,
    pub readings_new: u64,
    pub readings_duplicate: u64,
    pub alerts_raised: u64,
    pub source_errors: u64,
    pub storage_errors: u64,
}

impl MetricsSummary {
    /// Emit the snapshot as one structured log line
    pub fn log(&self) {
        info!(
            cycles_completed = %self.cycles_completed,
            cycles_failed = %self.cycles_failed,
            status_events_new = %self.status_events_new,
            status_events_duplicate = %self.status_events_duplicate,
            status_events_stale = %self.status_events_stale,
            readings_new = %self.readings_new,
            readings_duplicate = %self.readings_duplicate,
            alerts_raised = %self.alerts_raised,
            source_errors = %self.source_errors,
            storage_errors = %self.storage_errors,
            "metrics_report"
        );
    }
}
