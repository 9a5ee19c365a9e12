//! Sensor telemetry feed client
//!
//! Pulls temperature/humidity reports for a sensor over a time window and
//! parses them into source-neutral `SensorRecord`s. Records with missing
//! required fields pass through raw; the normalizer decides their fate.

use crate::domain::{RawLocation, RawTimestamp, SensorRecord, TimeWindow};
use crate::io::SourceError;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Sensor wire format - mirrors the upstream JSON 1:1
#[derive(Debug, Deserialize)]
struct ReportsResponse {
    #[serde(default)]
    reports: Vec<WireReport>,
}

#[derive(Debug, Deserialize)]
struct WireReport {
    timestamp: Option<RawTimestamp>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    location: Option<WireReportLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireReportLocation {
    Coordinate { lat: f64, lon: f64 },
    Name(String),
}

impl From<WireReportLocation> for RawLocation {
    fn from(loc: WireReportLocation) -> Self {
        match loc {
            WireReportLocation::Coordinate { lat, lon } => RawLocation::Coordinate { lat, lon },
            WireReportLocation::Name(name) => RawLocation::Place(name),
        }
    }
}

/// HTTP client for the sensor telemetry API
pub struct SensorClient {
    base_url: String,
    bearer_token: String,
    http_client: reqwest::Client,
}

impl SensorClient {
    /// Build a client with a per-call timeout baked into the connection pool
    pub fn new(base_url: &str, bearer_token: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            http_client,
        })
    }

    /// Fetch all reports for one sensor within the window
    pub async fn fetch_window(
        &self,
        sensor_ref: &str,
        window: TimeWindow,
    ) -> Result<Vec<SensorRecord>, SourceError> {
        let url = format!("{}/sensors/{}/reports", self.base_url, sensor_ref);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("from", window.from.to_rfc3339()),
                ("to", window.to.to_rfc3339()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "sensor feed returned HTTP {} for {}",
                status.as_u16(),
                sensor_ref
            )));
        }

        let parsed: ReportsResponse = response.json().await?;
        let records: Vec<SensorRecord> = parsed
            .reports
            .into_iter()
            .map(|r| SensorRecord {
                sensor_id: sensor_ref.to_string(),
                raw_timestamp: r.timestamp,
                temperature: r.temperature,
                humidity: r.humidity,
                raw_location: r.location.map(RawLocation::from),
            })
            .collect();

        debug!(
            sensor_ref = %sensor_ref,
            reports = %records.len(),
            "sensor_window_fetched"
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports() {
        let payload = r#"{
            "reports": [
                {
                    "timestamp": "2024-01-01T06:00:00Z",
                    "temperature": 5.2,
                    "humidity": 61.0,
                    "location": "Keflavik warehouse"
                },
                {
                    "timestamp": 1704093600000,
                    "temperature": 9.4,
                    "location": { "lat": 64.0, "lon": -22.6 }
                }
            ]
        }"#;

        let parsed: ReportsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.reports.len(), 2);
        assert_eq!(parsed.reports[0].temperature, Some(5.2));
        assert_eq!(parsed.reports[0].humidity, Some(61.0));
        assert_eq!(parsed.reports[1].humidity, None);
        assert_eq!(
            parsed.reports[1].timestamp,
            Some(RawTimestamp::EpochMillis(1704093600000))
        );
        assert!(matches!(
            parsed.reports[1].location,
            Some(WireReportLocation::Coordinate { .. })
        ));
    }

    #[test]
    fn test_parse_tolerates_missing_fields() {
        // Incomplete records survive the wire layer; normalization rejects them
        let payload = r#"{ "reports": [ { "humidity": 40.0 } ] }"#;

        let parsed: ReportsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.reports.len(), 1);
        assert!(parsed.reports[0].timestamp.is_none());
        assert!(parsed.reports[0].temperature.is_none());
    }

    #[test]
    fn test_parse_empty_body() {
        let parsed: ReportsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.reports.is_empty());
    }
}
