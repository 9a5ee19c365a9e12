//! Alert egress - writes raised temperature alerts to file
//!
//! Alerts are written in JSONL format (one JSON object per line)
//! to the file specified in config.

use crate::domain::TemperatureAlert;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Egress writer for raised alerts
pub struct AlertLog {
    file_path: String,
}

impl AlertLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "alert_log_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write one alert to the log file
    /// Returns true if successful, false otherwise
    pub fn write_alert(&self, tracking_number: &str, alert: &TemperatureAlert) -> bool {
        let line = serde_json::json!({
            "tracking_number": tracking_number,
            "shipment_id": alert.shipment_id,
            "ts": alert.timestamp.to_rfc3339(),
            "temperature": alert.temperature,
            "alert_type": alert.alert_type.as_str(),
        })
        .to_string();

        match self.append_line(&line) {
            Ok(()) => {
                info!(
                    tracking_number = %tracking_number,
                    alert_type = %alert.alert_type,
                    temperature = %alert.temperature,
                    "alert_logged"
                );
                true
            }
            Err(e) => {
                error!(
                    tracking_number = %tracking_number,
                    error = %e,
                    "alert_log_write_failed"
                );
                false
            }
        }
    }

    /// Append a line to the log file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "alert_log_written");

        Ok(())
    }

    /// Write multiple alerts, returning how many succeeded
    pub fn write_alerts(&self, tracking_number: &str, alerts: &[TemperatureAlert]) -> usize {
        alerts.iter().filter(|a| self.write_alert(tracking_number, a)).count()
    }
}
