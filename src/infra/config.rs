//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! The pipeline core consumes resolved values only (bands, timeouts,
//! endpoints); all file and environment access happens here, in the binary's
//! wiring layer.

use crate::domain::TemperatureBand;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierConfig {
    pub base_url: String,
    pub bearer_token: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorFeedConfig {
    pub base_url: String,
    pub bearer_token: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How far back each sensor window reaches
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_window_hours() -> u64 {
    168 // one week of telemetry per poll
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        // Standard cold-chain band
        Self { min: 2.0, max: 8.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: default_poll_interval_secs() }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// File path for raised alerts (JSONL format)
    #[serde(default = "default_alerts_file")]
    pub file: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { file: default_alerts_file() }
    }
}

fn default_alerts_file() -> String {
    "alerts.jsonl".to_string()
}

/// One shipment to poll, with an optional band override
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentEntry {
    pub tracking_number: String,
    pub sensor_id: String,
    #[serde(default)]
    pub band_min: Option<f64>,
    #[serde(default)]
    pub band_max: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub carrier: CarrierConfig,
    pub sensor: SensorFeedConfig,
    #[serde(default)]
    pub band: BandConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub shipments: Vec<ShipmentEntry>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    carrier_base_url: String,
    carrier_bearer_token: String,
    carrier_timeout_ms: u64,
    sensor_base_url: String,
    sensor_bearer_token: String,
    sensor_timeout_ms: u64,
    sensor_window_hours: u64,
    band_min: f64,
    band_max: f64,
    poll_interval_secs: u64,
    alerts_file: String,
    shipments: Vec<ShipmentEntry>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            carrier_base_url: "https://apis.carrier.example".to_string(),
            carrier_bearer_token: String::new(),
            carrier_timeout_ms: default_timeout_ms(),
            sensor_base_url: "https://telemetry.sensors.example".to_string(),
            sensor_bearer_token: String::new(),
            sensor_timeout_ms: default_timeout_ms(),
            sensor_window_hours: default_window_hours(),
            band_min: 2.0,
            band_max: 8.0,
            poll_interval_secs: default_poll_interval_secs(),
            alerts_file: default_alerts_file(),
            shipments: Vec::new(),
            config_file: "(defaults)".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let parsed: TomlConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        Ok(Self {
            carrier_base_url: parsed.carrier.base_url,
            carrier_bearer_token: parsed.carrier.bearer_token,
            carrier_timeout_ms: parsed.carrier.timeout_ms,
            sensor_base_url: parsed.sensor.base_url,
            sensor_bearer_token: parsed.sensor.bearer_token,
            sensor_timeout_ms: parsed.sensor.timeout_ms,
            sensor_window_hours: parsed.sensor.window_hours,
            band_min: parsed.band.min,
            band_max: parsed.band.max,
            poll_interval_secs: parsed.poll.interval_secs,
            alerts_file: parsed.alerts.file,
            shipments: parsed.shipments,
            config_file: path.display().to_string(),
        })
    }

    /// Load from the CLI path, CONFIG_FILE, or fall back to defaults
    pub fn load_from_path(cli_path: &str) -> Self {
        let path = if !cli_path.is_empty() {
            cli_path.to_string()
        } else {
            env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
        };

        match Self::from_file(&path) {
            Ok(config) => {
                info!(config_file = %path, "config_loaded");
                config
            }
            Err(e) => {
                warn!(config_file = %path, error = %e, "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn carrier_base_url(&self) -> &str {
        &self.carrier_base_url
    }

    pub fn carrier_bearer_token(&self) -> &str {
        &self.carrier_bearer_token
    }

    pub fn carrier_timeout(&self) -> Duration {
        Duration::from_millis(self.carrier_timeout_ms)
    }

    pub fn sensor_base_url(&self) -> &str {
        &self.sensor_base_url
    }

    pub fn sensor_bearer_token(&self) -> &str {
        &self.sensor_bearer_token
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn sensor_window_hours(&self) -> u64 {
        self.sensor_window_hours
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    pub fn alerts_file(&self) -> &str {
        &self.alerts_file
    }

    pub fn shipments(&self) -> &[ShipmentEntry] {
        &self.shipments
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Default band for shipments without an override
    pub fn default_band(&self) -> TemperatureBand {
        TemperatureBand::new(self.band_min, self.band_max)
    }

    /// Resolve the band for one shipment entry (override beats default)
    pub fn band_for(&self, entry: &ShipmentEntry) -> TemperatureBand {
        TemperatureBand::new(
            entry.band_min.unwrap_or(self.band_min),
            entry.band_max.unwrap_or(self.band_max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs(), 300);
        assert_eq!(config.sensor_window_hours(), 168);
        assert_eq!(config.default_band(), TemperatureBand::new(2.0, 8.0));
        assert!(config.shipments().is_empty());
    }

    #[test]
    fn test_band_for_applies_overrides() {
        let config = Config::default();
        let entry = ShipmentEntry {
            tracking_number: "T1".to_string(),
            sensor_id: "S1".to_string(),
            band_min: Some(-20.0),
            band_max: None,
        };

        assert_eq!(config.band_for(&entry), TemperatureBand::new(-20.0, 8.0));
    }
}
