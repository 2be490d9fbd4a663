//! Environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use airsense_pipeline::{PipelineConfig, SensorClientConfig};

/// Process configuration, read once at startup.
///
/// Every knob has a dev default so a bare `cargo run` comes up; production
/// deployments set the variables explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub sensor: SensorClientConfig,
    pub pipeline: PipelineConfig,
    pub model_path: PathBuf,
    #[cfg(feature = "postgres")]
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (testable without touching
    /// process environment).
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut sensor = SensorClientConfig::default();
        if let Some(url) = var("SENSOR_API_BASE_URL") {
            sensor.base_url = url;
        }
        match var("SENSOR_API_KEY") {
            Some(key) => sensor.api_key = key,
            None => warn!("SENSOR_API_KEY not set; sensor api calls will be unauthenticated"),
        }
        if let Some(id) = var("SENSOR_DEVICE_ID").and_then(|v| v.parse().ok()) {
            sensor.device_id = id;
        }

        let mut pipeline = PipelineConfig::default();
        if let Some(minute) = var("SCHEDULE_MINUTE").and_then(|v| v.parse::<u32>().ok()) {
            pipeline.schedule_minute = minute.min(59);
        }
        if let Some(secs) = var("RETRY_DELAY_SECS").and_then(|v| v.parse().ok()) {
            pipeline.retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = var("STAGE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            pipeline.stage_timeout = Duration::from_secs(secs);
            sensor.request_timeout = Duration::from_secs(secs);
        }

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            sensor,
            pipeline,
            model_path: var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("models/forest.json")),
            #[cfg(feature = "postgres")]
            database_url: var("DATABASE_URL"),
        }
    }
}
