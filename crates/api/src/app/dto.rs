//! Response DTOs.

use chrono::NaiveDateTime;
use serde::Serialize;

use airsense_core::CanonicalReading;
use airsense_model::Metrics;

/// `GET /readings`: all canonical readings, ascending, ISO-8601 timestamps.
#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub readings: Vec<CanonicalReading>,
    pub count: usize,
}

/// `POST /predict` success body.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted: f64,
    pub success: bool,
}

/// One `(actual, predicted)` backtest pair.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub timestamp: NaiveDateTime,
    pub actual: Option<f64>,
    pub predicted: f64,
}

/// `GET /prediction-history` body.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct MetricsBody {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// `GET /model-metrics` body.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    pub metrics: MetricsBody,
    pub n_samples: usize,
}

impl From<Metrics> for MetricsResponse {
    fn from(m: Metrics) -> Self {
        Self {
            success: true,
            metrics: MetricsBody {
                mae: m.mae,
                rmse: m.rmse,
                r2: m.r2,
            },
            n_samples: m.n_samples,
        }
    }
}
