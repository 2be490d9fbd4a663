//! Extract stage: fetch the latest raw reading from the sensor API.
//!
//! One outbound call per run, no other side effects. The wire payload is the
//! sensor network's "latest per location" shape: a list of
//! `(sensors_id, value, datetime)` entries for one fixed device.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use airsense_core::{Feature, PipelineError, PipelineResult, RawReading};

/// Device this deployment monitors.
pub const DEFAULT_DEVICE_ID: u64 = 4_903_652;

/// Sensor-id → channel mapping for the monitored device.
///
/// Ids not present in the map are ignored (the device may expose channels we
/// do not model).
#[derive(Debug, Clone)]
pub struct ChannelMap {
    entries: HashMap<u64, Feature>,
}

impl ChannelMap {
    pub fn new(entries: impl IntoIterator<Item = (u64, Feature)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn channel(&self, sensor_id: u64) -> Option<Feature> {
        self.entries.get(&sensor_id).copied()
    }
}

impl Default for ChannelMap {
    /// Sensor ids of the deployment's device.
    fn default() -> Self {
        Self::new([
            (13_477_544, Feature::Pm1),
            (13_477_545, Feature::Pm25),
            (13_477_546, Feature::RelativeHumidity),
            (13_477_547, Feature::Temperature),
            (13_477_548, Feature::Pm03),
        ])
    }
}

/// Source of raw readings. The orchestrator only knows this seam; tests and
/// the HTTP client both sit behind it.
#[async_trait]
pub trait SensorClient: Send + Sync {
    async fn fetch_latest(&self) -> PipelineResult<RawReading>;
}

/// Configuration for the outbound sensor API client.
#[derive(Debug, Clone)]
pub struct SensorClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub device_id: u64,
    pub request_timeout: Duration,
}

impl Default for SensorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openaq.org".to_string(),
            api_key: String::new(),
            device_id: DEFAULT_DEVICE_ID,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the sensor API's latest-values endpoint.
pub struct HttpSensorClient {
    http: reqwest::Client,
    config: SensorClientConfig,
    channels: ChannelMap,
}

impl HttpSensorClient {
    pub fn new(config: SensorClientConfig, channels: ChannelMap) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PipelineError::network(format!("cannot build http client: {e}")))?;
        Ok(Self {
            http,
            config,
            channels,
        })
    }
}

#[async_trait]
impl SensorClient for HttpSensorClient {
    async fn fetch_latest(&self) -> PipelineResult<RawReading> {
        let url = format!(
            "{}/v3/locations/{}/latest",
            self.config.base_url.trim_end_matches('/'),
            self.config.device_id
        );
        debug!(%url, "fetching latest sensor values");

        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::network(format!("sensor api request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::network(format!("sensor api body read failed: {e}")))?;

        if !status.is_success() {
            return Err(PipelineError::network(format!(
                "sensor api returned {status}"
            )));
        }

        parse_latest(&body, &self.channels)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestResponse {
    results: Vec<LatestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestEntry {
    sensors_id: u64,
    value: Option<f64>,
    datetime: EntryDatetime,
}

#[derive(Debug, Deserialize)]
struct EntryDatetime {
    utc: String,
}

/// Parse a latest-values payload into a raw reading.
///
/// Channels missing from the payload come back as `None`; an empty result
/// list or an unreadable timestamp is a parse error (fatal, never retried).
pub fn parse_latest(body: &str, channels: &ChannelMap) -> PipelineResult<RawReading> {
    let payload: LatestResponse = serde_json::from_str(body).map_err(|e| {
        error!(payload = body, "malformed sensor payload");
        PipelineError::parse(format!("malformed sensor payload: {e}"))
    })?;

    let first = payload.results.first().ok_or_else(|| {
        error!(payload = body, "sensor payload contained no results");
        PipelineError::parse("sensor payload contained no results")
    })?;

    // All entries share the device clock; take the instant from the first.
    let timestamp = parse_utc_timestamp(&first.datetime.utc)?;

    let mut reading = RawReading::new(timestamp);
    for entry in &payload.results {
        let Some(feature) = channels.channel(entry.sensors_id) else {
            continue;
        };
        if let Some(value) = entry.value {
            reading.set_channel(feature, value);
        }
    }
    Ok(reading)
}

/// Parse the wire timestamp into the pipeline's canonical naive form.
///
/// A trailing `Z` is normalized to an explicit `+00:00` offset first, then
/// the instant is converted to UTC and stripped of its offset.
pub fn parse_utc_timestamp(raw: &str) -> PipelineResult<NaiveDateTime> {
    let normalized = match raw.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => raw.to_string(),
    };

    let instant = DateTime::parse_from_rfc3339(&normalized)
        .map_err(|e| PipelineError::parse(format!("bad timestamp {raw:?}: {e}")))?;
    Ok(instant.with_timezone(&Utc).naive_utc())
}
