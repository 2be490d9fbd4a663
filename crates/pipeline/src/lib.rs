//! `airsense-pipeline` — infrastructure for the scheduled forecast pipeline.
//!
//! Wires the domain (`airsense-core`) and model (`airsense-model`) crates to
//! the outside world:
//! - `extract`: sensor API client (HTTP) producing raw readings
//! - `clean`: cleaner / feature builder with outlier-bounds filtering
//! - `store`: upsert-keyed persistence contract + engines
//! - `orchestrator`: the hourly Extract → Clean/Load → Predict loop

pub mod clean;
pub mod extract;
pub mod orchestrator;
pub mod store;

pub use clean::{CleanOutcome, clean, clean_batch};
pub use extract::{ChannelMap, HttpSensorClient, SensorClient, SensorClientConfig};
pub use orchestrator::{
    Pipeline, PipelineConfig, PipelineHandle, PipelineStats, RunOutcome, SharedStats,
};
pub use store::{InMemoryStore, MeasurementStore};
