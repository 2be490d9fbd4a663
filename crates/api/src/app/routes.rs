//! HTTP handlers.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use tracing::warn;

use crate::app::{AppServices, dto, errors};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Pipeline scheduler counters plus the store size.
pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let reading_count = match services.store.reading_count().await {
        Ok(n) => n,
        Err(e) => return errors::pipeline_error_to_response(&e),
    };
    let stats = services.stats.lock().unwrap().clone();

    Json(serde_json::json!({
        "status": "ok",
        "readings": reading_count,
        "pipeline": stats,
    }))
    .into_response()
}

/// All canonical readings, ascending by timestamp.
pub async fn readings(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.all_readings().await {
        Ok(readings) => Json(dto::ReadingsResponse {
            count: readings.len(),
            readings,
        })
        .into_response(),
        Err(e) => errors::pipeline_error_to_response(&e),
    }
}

/// One single-shot forecast against the latest stored reading.
pub async fn predict(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let latest = match services.store.latest_reading().await {
        Ok(Some(reading)) => reading,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "no data available for prediction");
        }
        Err(e) => return errors::pipeline_error_to_response(&e),
    };

    let prediction = match services.predictor.predict_next(&latest) {
        Ok(prediction) => prediction,
        Err(e) => return errors::pipeline_error_to_response(&e),
    };

    // Idempotent by timestamp key; re-predicting the same hour is a no-op.
    if let Err(e) = services.store.upsert_prediction(&prediction).await {
        return errors::pipeline_error_to_response(&e);
    }

    Json(dto::PredictResponse {
        predicted: prediction.predicted_pm25,
        success: true,
    })
    .into_response()
}

/// Backtest pairs for the last 5 readings (backtest precision policy).
pub async fn prediction_history(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let recent = match services.store.recent_readings(5).await {
        Ok(readings) => readings,
        Err(e) => return errors::pipeline_error_to_response(&e),
    };

    let mut data = Vec::with_capacity(recent.len());
    for reading in &recent {
        match services.predictor.predict_for(reading) {
            Ok(prediction) => data.push(dto::HistoryEntry {
                timestamp: reading.timestamp,
                actual: reading.pm25,
                predicted: prediction.predicted_pm25,
            }),
            // Rows the model cannot score are omitted rather than failing
            // the whole response.
            Err(e) => warn!(key = %reading.key(), %e, "history row skipped"),
        }
    }

    Json(dto::HistoryResponse {
        success: true,
        data,
    })
    .into_response()
}

/// Model quality over the 100 most recent readings.
pub async fn model_metrics(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let recent = match services.store.recent_readings(100).await {
        Ok(readings) => readings,
        Err(e) => return errors::pipeline_error_to_response(&e),
    };

    // An empty store and a batch with no scorable rows look the same to the
    // caller: there is nothing to evaluate.
    match services.predictor.evaluate(&recent) {
        Ok(Some(metrics)) => Json(dto::MetricsResponse::from(metrics)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "no data for evaluation"),
        Err(e) => errors::pipeline_error_to_response(&e),
    }
}
