//! `airsense-api` — HTTP surface and process wiring.
//!
//! The API layer is a thin pass-through over the store and predictor; all
//! pipeline semantics live in `airsense-pipeline`. Layout:
//! - `app/`: Axum router, routes, DTOs, error mapping
//! - `config.rs`: environment configuration with dev defaults
//! - `telemetry.rs`: tracing/logging initialization

pub mod app;
pub mod config;
pub mod telemetry;
