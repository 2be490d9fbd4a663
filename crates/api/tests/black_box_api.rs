use std::sync::Arc;

use chrono::NaiveDateTime;
use reqwest::StatusCode;

use airsense_api::app::{self, AppServices};
use airsense_core::{CanonicalReading, RawReading};
use airsense_model::{ModelArtifact, Predictor, Tree};
use airsense_pipeline::{InMemoryStore, MeasurementStore};

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Build the prod router over a seeded in-memory store and bind it to an
    /// ephemeral port.
    async fn spawn(predictor: Predictor, seed: Vec<CanonicalReading>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        for reading in &seed {
            store.upsert_reading(reading).await.unwrap();
        }

        let services = Arc::new(AppServices {
            store: store.clone(),
            predictor,
            stats: Arc::default(),
        });
        let app = app::build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reading(key: &str, pm1: f64, pm25: Option<f64>) -> CanonicalReading {
    let ts = NaiveDateTime::parse_from_str(key, "%Y-%m-%d %H:%M:%S").unwrap();
    let raw = RawReading {
        timestamp: ts,
        pm1: Some(pm1),
        pm25,
        relative_humidity: Some(50.0),
        temperature: Some(22.0),
        pm03: Some(1500.0),
    };
    CanonicalReading::from_raw(&raw)
}

fn constant_predictor(value: f64) -> Predictor {
    Predictor::new(Arc::new(
        ModelArtifact::new(ModelArtifact::input_names(), vec![Tree::leaf(value)]).unwrap(),
    ))
}

/// Predictor keyed on pm1: 1.0 -> 1.1, 2.0 -> 1.8, 3.0 -> 3.3.
fn pm1_keyed_predictor() -> Predictor {
    let tree = Tree {
        children_left: vec![1, -1, 3, -1, -1],
        children_right: vec![2, -1, 4, -1, -1],
        feature: vec![0, -1, 0, -1, -1],
        threshold: vec![1.5, 0.0, 2.5, 0.0, 0.0],
        value: vec![0.0, 1.1, 0.0, 1.8, 3.3],
    };
    Predictor::new(Arc::new(
        ModelArtifact::new(ModelArtifact::input_names(), vec![tree]).unwrap(),
    ))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(constant_predictor(12.0), vec![]).await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn readings_are_ascending_with_iso_timestamps() {
    let srv = TestServer::spawn(
        constant_predictor(12.0),
        vec![
            reading("2024-01-01 11:00:00", 5.0, Some(10.0)),
            reading("2024-01-01 10:00:00", 5.0, Some(9.0)),
        ],
    )
    .await;

    let body: serde_json::Value = reqwest::get(format!("{}/readings", srv.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], 2);
    let readings = body["readings"].as_array().unwrap();
    assert_eq!(readings[0]["timestamp"], "2024-01-01T10:00:00");
    assert_eq!(readings[1]["timestamp"], "2024-01-01T11:00:00");
    assert_eq!(readings[0]["pm25 (µg/m³)"], 9.0);
}

#[tokio::test]
async fn predict_with_empty_store_is_404() {
    let srv = TestServer::spawn(constant_predictor(12.0), vec![]).await;

    let res = reqwest::Client::new()
        .post(format!("{}/predict", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("no data"));
}

#[tokio::test]
async fn predict_uses_latest_reading_and_persists_the_forecast() {
    let srv = TestServer::spawn(
        constant_predictor(12.34),
        vec![
            reading("2024-01-01 10:00:00", 5.0, Some(10.0)),
            reading("2024-01-01 11:00:00", 6.0, Some(11.0)),
        ],
    )
    .await;

    let res = reqwest::Client::new()
        .post(format!("{}/predict", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    // Single-shot policy rounds to one decimal.
    assert_eq!(body["predicted"], 12.3);

    assert_eq!(srv.store.prediction_count(), 1);
    let persisted = srv.store.recent_predictions(1).await.unwrap();
    assert_eq!(persisted[0].key(), "2024-01-01 11:00:00");
}

#[tokio::test]
async fn predict_with_missing_feature_is_unprocessable() {
    let mut incomplete = reading("2024-01-01 10:00:00", 5.0, Some(10.0));
    incomplete.temperature = None;
    let srv = TestServer::spawn(constant_predictor(12.0), vec![incomplete]).await;

    let res = reqwest::Client::new()
        .post(format!("{}/predict", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(srv.store.prediction_count(), 0);
}

#[tokio::test]
async fn prediction_history_returns_backtest_pairs() {
    let seed: Vec<CanonicalReading> = (0..7)
        .map(|i| reading(&format!("2024-01-01 {:02}:00:00", 10 + i), 1.0, Some(1.0)))
        .collect();
    let srv = TestServer::spawn(pm1_keyed_predictor(), seed).await;

    let body: serde_json::Value = reqwest::get(format!("{}/prediction-history", srv.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data[0]["actual"], 1.0);
    assert_eq!(data[0]["predicted"], 1.1);
}

#[tokio::test]
async fn model_metrics_reports_the_reference_batch() {
    let srv = TestServer::spawn(
        pm1_keyed_predictor(),
        vec![
            reading("2024-01-01 10:00:00", 1.0, Some(1.0)),
            reading("2024-01-01 11:00:00", 2.0, Some(2.0)),
            reading("2024-01-01 12:00:00", 3.0, Some(3.0)),
        ],
    )
    .await;

    let body: serde_json::Value = reqwest::get(format!("{}/model-metrics", srv.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["metrics"]["mae"], 0.2);
    assert_eq!(body["metrics"]["rmse"], 0.22);
    assert_eq!(body["metrics"]["r2"], 0.93);
    assert_eq!(body["n_samples"], 3);
}

#[tokio::test]
async fn model_metrics_with_empty_store_is_404() {
    let srv = TestServer::spawn(constant_predictor(12.0), vec![]).await;
    let res = reqwest::get(format!("{}/model-metrics", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn model_metrics_without_scorable_rows_is_404() {
    // Stored readings exist but none carries the actual target value.
    let srv = TestServer::spawn(
        pm1_keyed_predictor(),
        vec![
            reading("2024-01-01 10:00:00", 1.0, None),
            reading("2024-01-01 11:00:00", 2.0, None),
        ],
    )
    .await;

    let res = reqwest::get(format!("{}/model-metrics", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn status_exposes_pipeline_counters() {
    let srv = TestServer::spawn(
        constant_predictor(12.0),
        vec![reading("2024-01-01 10:00:00", 5.0, Some(10.0))],
    )
    .await;

    let body: serde_json::Value = reqwest::get(format!("{}/status", srv.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["readings"], 1);
    assert_eq!(body["pipeline"]["runs_started"], 0);
}
