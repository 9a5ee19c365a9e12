//! Coldtrace - cold-chain shipment reconciliation pipeline
//!
//! Pulls carrier tracking updates and sensor telemetry, merges them into
//! per-shipment timelines, and raises temperature-excursion alerts.
//!
//! Module structure:
//! - `domain/` - Core business types (Shipment, StatusEvent, SensorReading)
//! - `io/` - External interfaces (carrier feed, sensor feed, store, alert log)
//! - `services/` - Business logic (Normalizer, Excursion Evaluator, Reconciler)
//! - `infra/` - Infrastructure (Config, Metrics)
//!
//! This binary is the scheduling trigger: the pipeline core holds no timers
//! or background tasks of its own and is driven purely through its two
//! ingestion entry points.

use chrono::Utc;
use clap::Parser;
use coldtrace::domain::{TemperatureBand, TimeWindow};
use coldtrace::infra::{Config, Metrics, ShipmentEntry};
use coldtrace::io::{AlertLog, CarrierClient, MemoryStore, SensorClient};
use coldtrace::services::Reconciler;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Coldtrace - shipment tracking and temperature monitoring pipeline
#[derive(Parser, Debug)]
#[command(name = "coldtrace", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

/// Cadence for metrics snapshots in the log
const METRICS_REPORT_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("coldtrace starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        carrier_base_url = %config.carrier_base_url(),
        sensor_base_url = %config.sensor_base_url(),
        poll_interval_secs = %config.poll_interval_secs(),
        window_hours = %config.sensor_window_hours(),
        shipments = %config.shipments().len(),
        alerts_file = %config.alerts_file(),
        "pipeline_configured"
    );

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let store = Arc::new(MemoryStore::new());
    let carrier = CarrierClient::new(
        config.carrier_base_url(),
        config.carrier_bearer_token(),
        config.carrier_timeout(),
    )?;
    let sensor = SensorClient::new(
        config.sensor_base_url(),
        config.sensor_bearer_token(),
        config.sensor_timeout(),
    )?;
    let reconciler = Arc::new(
        Reconciler::new(store, carrier, sensor, metrics.clone())
            .with_alert_log(AlertLog::new(config.alerts_file())),
    );

    // Periodic metrics reporter
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(METRICS_REPORT_SECS));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let mut tick =
        tokio::time::interval(std::time::Duration::from_secs(config.poll_interval_secs()));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_poll_cycle(&reconciler, &config).await;
            }
            _ = shutdown_rx.changed() => {
                break;
            }
        }
    }

    metrics.report().log();
    info!("coldtrace shutdown complete");
    Ok(())
}

/// Run one ingestion pass over every configured shipment
///
/// Shipments are independent, so their cycles run concurrently; the
/// reconciler serializes per shipment internally. A failed cycle is logged
/// by the reconciler and simply retried on the next tick.
async fn run_poll_cycle(reconciler: &Arc<Reconciler>, config: &Config) {
    let mut cycles = JoinSet::new();

    for entry in config.shipments() {
        let reconciler = reconciler.clone();
        let entry = entry.clone();
        let band = config.band_for(&entry);
        let window_hours = config.sensor_window_hours();

        cycles.spawn(async move {
            poll_shipment(&reconciler, &entry, band, window_hours).await;
        });
    }

    while cycles.join_next().await.is_some() {}
}

async fn poll_shipment(
    reconciler: &Reconciler,
    entry: &ShipmentEntry,
    band: TemperatureBand,
    window_hours: u64,
) {
    // Carrier first: a first-sight tracking number creates the shipment
    // the sensor cycle needs to resolve
    let summary = match reconciler.ingest_carrier(&entry.tracking_number).await {
        Ok(summary) => summary,
        Err(_) => return, // logged by the reconciler; next tick retries
    };

    let now = Utc::now();
    let window = TimeWindow::new(now - chrono::Duration::hours(window_hours as i64), now);

    match reconciler
        .ingest_sensor(&summary.shipment.id, &entry.sensor_id, window, band)
        .await
    {
        Ok(sensor_summary) => {
            debug!(
                tracking_number = %entry.tracking_number,
                new_status_events = %summary.new_status_events,
                new_readings = %sensor_summary.new_readings,
                new_alerts = %sensor_summary.new_alerts,
                current_status = %sensor_summary.shipment.current_status,
                "shipment_poll_complete"
            );
        }
        Err(_) => {} // logged by the reconciler; next tick retries
    }
}
