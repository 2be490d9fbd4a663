//! `airsense-model` — model subsystem boundary.
//!
//! **Responsibility:** loading the pretrained regression artifact, building
//! feature vectors, producing forecasts, and scoring the model against
//! stored actuals.
//!
//! This crate is deliberately storage-agnostic: callers (pipeline/API) fetch
//! readings and hand them in; nothing here performs I/O besides the one-time
//! artifact load at process start.

pub mod artifact;
pub mod metrics;
pub mod predictor;

pub use artifact::{ModelArtifact, Tree};
pub use metrics::Metrics;
pub use predictor::Predictor;
