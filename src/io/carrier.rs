//! Carrier tracking feed client
//!
//! Pulls tracking updates over HTTPS and parses the carrier's nested JSON
//! into a source-neutral `CarrierRecord`. No storage access, no business
//! rules, no internal retries.

use crate::domain::{CarrierRecord, CarrierScanEvent, RawLocation, RawTimestamp};
use crate::io::SourceError;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Carrier wire format - mirrors the upstream JSON 1:1
#[derive(Debug, Deserialize)]
struct TrackResponse {
    output: TrackOutput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackOutput {
    #[serde(default)]
    complete_track_results: Vec<TrackResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackResult {
    origin_location: Option<WireAddress>,
    destination_location: Option<WireAddress>,
    #[serde(default)]
    scan_events: Vec<WireScanEvent>,
}

#[derive(Debug, Deserialize)]
struct WireAddress {
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireScanEvent {
    status: Option<String>,
    scan_location: Option<WireLocation>,
    date_scan: Option<RawTimestamp>,
}

/// Upstream location shapes: coordinates, an address object, or a bare name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireLocation {
    Coordinate { lat: f64, lon: f64 },
    Address { city: String },
    Name(String),
}

impl From<WireLocation> for RawLocation {
    fn from(loc: WireLocation) -> Self {
        match loc {
            WireLocation::Coordinate { lat, lon } => RawLocation::Coordinate { lat, lon },
            WireLocation::Address { city } => RawLocation::Place(city),
            WireLocation::Name(name) => RawLocation::Place(name),
        }
    }
}

/// HTTP client for the carrier tracking API
pub struct CarrierClient {
    base_url: String,
    bearer_token: String,
    http_client: reqwest::Client,
}

impl CarrierClient {
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

    /// Fetch the latest tracking update for one tracking number
    pub async fn fetch_update(&self, tracking_number: &str) -> Result<CarrierRecord, SourceError> {
        let url = format!("{}/track/v1/trackingnumbers", self.base_url);
        let body = json!({
            "includeDetailedScans": true,
            "trackingInfo": [
                { "trackingNumberInfo": { "trackingNumber": tracking_number } }
            ]
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "carrier returned HTTP {} for {}",
                status.as_u16(),
                tracking_number
            )));
        }

        let parsed: TrackResponse = response.json().await?;
        let record = into_record(tracking_number, parsed)?;

        debug!(
            tracking_number = %tracking_number,
            scan_events = %record.events.len(),
            "carrier_update_fetched"
        );

        Ok(record)
    }
}

/// Flatten the wire response into the intermediate record
fn into_record(
    tracking_number: &str,
    response: TrackResponse,
) -> Result<CarrierRecord, SourceError> {
    let result = response.output.complete_track_results.into_iter().next().ok_or_else(|| {
        SourceError::Malformed(format!("no track results for {}", tracking_number))
    })?;

    let mut events = Vec::with_capacity(result.scan_events.len());
    for event in result.scan_events {
        let raw_status = event.status.ok_or_else(|| {
            SourceError::Malformed("scan event missing status field".to_string())
        })?;
        let raw_timestamp = event.date_scan.ok_or_else(|| {
            SourceError::Malformed("scan event missing dateScan field".to_string())
        })?;
        events.push(CarrierScanEvent {
            raw_status,
            raw_location: event.scan_location.map(RawLocation::from),
            raw_timestamp,
        });
    }

    Ok(CarrierRecord {
        tracking_number: tracking_number.to_string(),
        origin: result.origin_location.and_then(|a| a.city),
        destination: result.destination_location.and_then(|a| a.city),
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(payload: &str) -> Result<CarrierRecord, SourceError> {
        let response: TrackResponse = serde_json::from_str(payload).unwrap();
        into_record("T1", response)
    }

    #[test]
    fn test_parse_full_response() {
        let record = parse(
            r#"{
                "output": {
                    "completeTrackResults": [{
                        "originLocation": { "city": "Memphis" },
                        "destinationLocation": { "city": "Reykjavik" },
                        "scanEvents": [
                            {
                                "status": "IN_TRANSIT",
                                "scanLocation": { "lat": 40.0, "lon": -75.0 },
                                "dateScan": "2024-01-01T00:00:00Z"
                            },
                            {
                                "status": "DELIVERED",
                                "scanLocation": { "city": "Reykjavik" },
                                "dateScan": 1704153600000
                            }
                        ]
                    }]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(record.tracking_number, "T1");
        assert_eq!(record.origin.as_deref(), Some("Memphis"));
        assert_eq!(record.destination.as_deref(), Some("Reykjavik"));
        assert_eq!(record.events.len(), 2);
        assert_eq!(record.events[0].raw_status, "IN_TRANSIT");
        assert_eq!(
            record.events[0].raw_location,
            Some(RawLocation::Coordinate { lat: 40.0, lon: -75.0 })
        );
        assert_eq!(
            record.events[0].raw_timestamp,
            RawTimestamp::Text("2024-01-01T00:00:00Z".to_string())
        );
        assert_eq!(
            record.events[1].raw_location,
            Some(RawLocation::Place("Reykjavik".to_string()))
        );
        assert_eq!(record.events[1].raw_timestamp, RawTimestamp::EpochMillis(1704153600000));
    }

    #[test]
    fn test_parse_empty_results_is_malformed() {
        let err = parse(r#"{ "output": { "completeTrackResults": [] } }"#).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_parse_missing_scan_timestamp_is_malformed() {
        let err = parse(
            r#"{
                "output": {
                    "completeTrackResults": [{
                        "scanEvents": [{ "status": "IN_TRANSIT" }]
                    }]
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_parse_no_scan_events() {
        let record = parse(
            r#"{
                "output": {
                    "completeTrackResults": [{
                        "originLocation": { "city": "Memphis" }
                    }]
                }
            }"#,
        )
        .unwrap();

        assert!(record.events.is_empty());
        assert_eq!(record.origin.as_deref(), Some("Memphis"));
    }
}
