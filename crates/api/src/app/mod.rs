//! HTTP application wiring (Axum router + shared services).
//!
//! Folder layout:
//! - `routes.rs`: HTTP handlers
//! - `dto.rs`: response DTOs and JSON shapes
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use airsense_model::Predictor;
use airsense_pipeline::{MeasurementStore, SharedStats};

pub mod dto;
pub mod errors;
pub mod routes;

/// Shared state handed to every handler.
///
/// Constructed once at process start and passed by reference; there are no
/// ambient singletons.
pub struct AppServices {
    pub store: Arc<dyn MeasurementStore>,
    pub predictor: Predictor,
    pub stats: SharedStats,
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        .route("/readings", get(routes::readings))
        .route("/predict", post(routes::predict))
        .route("/prediction-history", get(routes::prediction_history))
        .route("/model-metrics", get(routes::model_metrics))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
