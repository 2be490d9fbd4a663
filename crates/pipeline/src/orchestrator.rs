//! Scheduled Extract → Clean/Load → Predict pipeline.
//!
//! One run per hourly tick at a fixed minute offset. Runs are single-flight
//! by construction: the scheduler is one sequential task, so a new run can
//! never start while a prior run (including its retry) is in flight. There
//! is no catch-up of missed ticks; a failed run is recorded and the next
//! tick starts fresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use airsense_core::{BoundsTable, Feature, PipelineError, PipelineResult};
use airsense_model::Predictor;

use crate::clean::{CleanOutcome, clean};
use crate::extract::SensorClient;
use crate::store::MeasurementStore;

/// Identifier correlating all log lines of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduler and stage configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minute offset of the hourly tick (0..=59).
    pub schedule_minute: u32,
    /// Delay before the single retry of a retryable failure.
    pub retry_delay: Duration,
    /// Per-stage timeout for blocking I/O (extract, load, prediction write).
    pub stage_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schedule_minute: 20,
            retry_delay: Duration::from_secs(300),
            stage_timeout: Duration::from_secs(30),
        }
    }
}

/// How one successful run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Reading committed and forecast persisted.
    Completed { key: String },
    /// The record fell outside its outlier bounds; nothing was written.
    ExcludedByBounds { feature: Feature, value: f64 },
    /// Reading committed, but this run's forecast was skipped.
    PredictionSkipped { key: String, reason: PipelineError },
}

/// Scheduler counters, surfaced by the API status route.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineStats {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_excluded: u64,
    pub predictions_skipped: u64,
    pub runs_failed: u64,
    pub retries: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type SharedStats = Arc<Mutex<PipelineStats>>;

/// Handle to a running pipeline scheduler.
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: watch::Sender<bool>,
    join: Option<tokio::task::JoinHandle<()>>,
    stats: SharedStats,
}

impl PipelineHandle {
    /// Request graceful shutdown and wait for the loop to stop.
    ///
    /// A run already in flight finishes first; partial writes are safe
    /// because every write is an idempotent upsert.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }
}

/// The four-stage pipeline plus its scheduler state.
pub struct Pipeline {
    client: Arc<dyn SensorClient>,
    bounds: BoundsTable,
    predictor: Predictor,
    store: Arc<dyn MeasurementStore>,
    config: PipelineConfig,
    stats: SharedStats,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn SensorClient>,
        bounds: BoundsTable,
        predictor: Predictor,
        store: Arc<dyn MeasurementStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            bounds,
            predictor,
            store,
            config,
            stats: Arc::new(Mutex::new(PipelineStats::default())),
        }
    }

    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Execute one Extract → Clean/Load → Predict run.
    ///
    /// Stage failures abort the run; later stages do not execute and nothing
    /// beyond already-committed upserts is written.
    pub async fn run_once(&self) -> PipelineResult<RunOutcome> {
        // Extract.
        let raw = timeout(self.config.stage_timeout, self.client.fetch_latest())
            .await
            .map_err(|_| PipelineError::network("extract stage timed out"))??;

        // Clean / feature build (pure).
        let canonical = match clean(&raw, &self.bounds) {
            CleanOutcome::Kept(reading) => reading,
            CleanOutcome::Excluded { feature, value } => {
                return Ok(RunOutcome::ExcludedByBounds { feature, value });
            }
        };
        let key = canonical.key();

        // Load.
        timeout(self.config.stage_timeout, self.store.upsert_reading(&canonical))
            .await
            .map_err(|_| PipelineError::store("load stage timed out"))??;

        // Predict. Missing inputs or a model failure only cost this run its
        // forecast; the committed reading stands.
        let prediction = match self.predictor.predict_next(&canonical) {
            Ok(prediction) => prediction,
            Err(reason @ (PipelineError::MissingFeature(_) | PipelineError::Model(_))) => {
                warn!(%key, %reason, "prediction skipped");
                return Ok(RunOutcome::PredictionSkipped { key, reason });
            }
            Err(other) => return Err(other),
        };

        timeout(
            self.config.stage_timeout,
            self.store.upsert_prediction(&prediction),
        )
        .await
        .map_err(|_| PipelineError::store("prediction write timed out"))??;

        info!(%key, predicted = prediction.predicted_pm25, "run completed");
        Ok(RunOutcome::Completed { key })
    }

    /// `run_once`, retried once after `retry_delay` when the failure kind is
    /// retryable. Fatal kinds fail immediately.
    pub async fn run_with_retry(&self) -> PipelineResult<RunOutcome> {
        match self.run_once().await {
            Err(err) if err.is_retryable() => {
                warn!(%err, delay = ?self.config.retry_delay, "run failed; retrying once");
                self.stats.lock().unwrap().retries += 1;
                tokio::time::sleep(self.config.retry_delay).await;
                self.run_once().await
            }
            other => other,
        }
    }

    async fn scheduled_run(&self) {
        let run_id = RunId::new();
        {
            let mut stats = self.stats.lock().unwrap();
            stats.runs_started += 1;
            stats.last_run_at = Some(Utc::now());
        }

        match self.run_with_retry().await {
            Ok(outcome) => {
                let mut stats = self.stats.lock().unwrap();
                stats.last_error = None;
                match outcome {
                    RunOutcome::Completed { .. } => stats.runs_completed += 1,
                    RunOutcome::ExcludedByBounds { feature, value } => {
                        stats.runs_excluded += 1;
                        drop(stats);
                        info!(%run_id, %feature, value, "run skipped: record outside bounds");
                    }
                    RunOutcome::PredictionSkipped { .. } => {
                        stats.runs_completed += 1;
                        stats.predictions_skipped += 1;
                    }
                }
            }
            Err(err) => {
                // Recorded and skipped; the next tick starts fresh.
                error!(%run_id, %err, "run failed");
                let mut stats = self.stats.lock().unwrap();
                stats.runs_failed += 1;
                stats.last_error = Some(err.to_string());
            }
        }
    }

    /// Spawn the hourly scheduler loop.
    pub fn spawn(self) -> PipelineHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let minute = self.config.schedule_minute.min(59);

        let join = tokio::spawn(async move {
            info!(minute, "pipeline scheduler started");
            loop {
                let wait = sleep_until_next_tick(Utc::now(), minute);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown_rx.changed() => break,
                }
                self.scheduled_run().await;

                if *shutdown_rx.borrow() {
                    break;
                }
            }
            info!("pipeline scheduler stopped");
        });

        PipelineHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

/// Time until the next hourly tick at `minute` past the hour.
fn sleep_until_next_tick(now: DateTime<Utc>, minute: u32) -> Duration {
    (next_tick(now, minute) - now).to_std().unwrap_or(Duration::ZERO)
}

/// The next instant at `minute` past the hour, strictly after `now`.
fn next_tick(now: DateTime<Utc>, minute: u32) -> DateTime<Utc> {
    let this_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let tick = this_hour + chrono::Duration::minutes(i64::from(minute));
    if tick > now {
        tick
    } else {
        tick + chrono::Duration::hours(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDateTime;

    use airsense_core::{CanonicalReading, Prediction, RawReading};
    use airsense_model::{ModelArtifact, Tree};

    use crate::store::InMemoryStore;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn sample_reading() -> RawReading {
        RawReading {
            timestamp: ts("2024-01-01 10:00:00"),
            pm1: Some(5.0),
            pm25: Some(10.0),
            relative_humidity: Some(50.0),
            temperature: Some(22.0),
            pm03: Some(1500.0),
        }
    }

    /// Client that replays a fixed reading, optionally failing first.
    struct StubClient {
        reading: RawReading,
        failures: AtomicUsize,
        failure: Option<PipelineError>,
        calls: AtomicUsize,
    }

    impl StubClient {
        fn ok(reading: RawReading) -> Self {
            Self {
                reading,
                failures: AtomicUsize::new(0),
                failure: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_first(reading: RawReading, n: usize, failure: PipelineError) -> Self {
            Self {
                reading,
                failures: AtomicUsize::new(n),
                failure: Some(failure),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SensorClient for StubClient {
        async fn fetch_latest(&self) -> PipelineResult<RawReading> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(self.failure.clone().unwrap());
            }
            Ok(self.reading.clone())
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl MeasurementStore for BrokenStore {
        async fn upsert_reading(&self, _: &CanonicalReading) -> PipelineResult<()> {
            Err(PipelineError::store("disk on fire"))
        }
        async fn upsert_prediction(&self, _: &Prediction) -> PipelineResult<()> {
            Err(PipelineError::store("disk on fire"))
        }
        async fn all_readings(&self) -> PipelineResult<Vec<CanonicalReading>> {
            Ok(Vec::new())
        }
        async fn recent_readings(&self, _: usize) -> PipelineResult<Vec<CanonicalReading>> {
            Ok(Vec::new())
        }
        async fn recent_predictions(&self, _: usize) -> PipelineResult<Vec<Prediction>> {
            Ok(Vec::new())
        }
        async fn reading_count(&self) -> PipelineResult<usize> {
            Ok(0)
        }
    }

    fn predictor(value: f64) -> Predictor {
        Predictor::new(Arc::new(
            ModelArtifact::new(ModelArtifact::input_names(), vec![Tree::leaf(value)]).unwrap(),
        ))
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            schedule_minute: 20,
            retry_delay: Duration::ZERO,
            stage_timeout: Duration::from_secs(5),
        }
    }

    fn pipeline_with(
        client: Arc<StubClient>,
        store: Arc<dyn MeasurementStore>,
        value: f64,
    ) -> Pipeline {
        Pipeline::new(
            client,
            BoundsTable::default(),
            predictor(value),
            store,
            fast_config(),
        )
    }

    #[tokio::test]
    async fn successful_run_commits_reading_and_prediction() {
        let client = Arc::new(StubClient::ok(sample_reading()));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client, store.clone(), 12.34);

        let outcome = pipeline.run_once().await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                key: "2024-01-01 10:00:00".to_string()
            }
        );

        assert_eq!(store.reading_count().await.unwrap(), 1);
        let predictions = store.recent_predictions(5).await.unwrap();
        assert_eq!(predictions.len(), 1);
        // Single-shot precision policy: one decimal.
        assert_eq!(predictions[0].predicted_pm25, 12.3);
        assert_eq!(predictions[0].key(), "2024-01-01 10:00:00");
    }

    #[tokio::test]
    async fn out_of_bounds_record_is_excluded_with_zero_writes() {
        let mut raw = sample_reading();
        raw.pm03 = Some(5000.0);
        let client = Arc::new(StubClient::ok(raw));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client, store.clone(), 12.34);

        let outcome = pipeline.run_once().await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::ExcludedByBounds {
                feature: Feature::Pm03,
                value: 5000.0
            }
        );
        assert_eq!(store.reading_count().await.unwrap(), 0);
        assert_eq!(store.prediction_count(), 0);
    }

    #[tokio::test]
    async fn missing_feature_skips_prediction_but_commits_reading() {
        let mut raw = sample_reading();
        raw.temperature = None;
        let client = Arc::new(StubClient::ok(raw));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client, store.clone(), 12.34);

        let outcome = pipeline.run_once().await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::PredictionSkipped {
                reason: PipelineError::MissingFeature(Feature::Temperature),
                ..
            }
        ));
        assert_eq!(store.reading_count().await.unwrap(), 1);
        assert_eq!(store.prediction_count(), 0);
    }

    #[tokio::test]
    async fn network_failure_is_retried_once_and_recovers() {
        let client = Arc::new(StubClient::failing_first(
            sample_reading(),
            1,
            PipelineError::network("connection refused"),
        ));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client.clone(), store.clone(), 12.34);

        let outcome = pipeline.run_with_retry().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(client.calls(), 2);
        assert_eq!(store.reading_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn network_failure_is_retried_at_most_once() {
        let client = Arc::new(StubClient::failing_first(
            sample_reading(),
            5,
            PipelineError::network("connection refused"),
        ));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client.clone(), store, 12.34);

        let err = pipeline.run_with_retry().await.unwrap_err();
        assert!(matches!(err, PipelineError::Network(_)));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn parse_failure_is_fatal_and_never_retried() {
        let client = Arc::new(StubClient::failing_first(
            sample_reading(),
            5,
            PipelineError::parse("garbage payload"),
        ));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client.clone(), store, 12.34);

        let err = pipeline.run_with_retry().await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn store_failure_aborts_before_prediction() {
        let client = Arc::new(StubClient::ok(sample_reading()));
        let pipeline = pipeline_with(client, Arc::new(BrokenStore), 12.34);

        let err = pipeline.run_with_retry().await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
    }

    #[tokio::test]
    async fn scheduled_run_records_failures_in_stats() {
        let client = Arc::new(StubClient::failing_first(
            sample_reading(),
            5,
            PipelineError::parse("garbage payload"),
        ));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client, store, 12.34);

        pipeline.scheduled_run().await;

        let stats = pipeline.stats.lock().unwrap().clone();
        assert_eq!(stats.runs_started, 1);
        assert_eq!(stats.runs_failed, 1);
        assert!(stats.last_error.is_some());
    }

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn next_tick_stays_in_the_current_hour_when_ahead() {
        assert_eq!(
            next_tick(utc("2024-01-01 10:05:00"), 20),
            utc("2024-01-01 10:20:00")
        );
    }

    #[test]
    fn next_tick_rolls_to_the_next_hour_when_passed() {
        assert_eq!(
            next_tick(utc("2024-01-01 10:20:00"), 20),
            utc("2024-01-01 11:20:00")
        );
        assert_eq!(
            next_tick(utc("2024-01-01 10:45:30"), 20),
            utc("2024-01-01 11:20:00")
        );
    }

    #[tokio::test]
    async fn scheduler_shuts_down_gracefully() {
        let client = Arc::new(StubClient::ok(sample_reading()));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(client, store, 12.34);

        let handle = pipeline.spawn();
        let stats = handle.stats();
        assert_eq!(stats.runs_started, 0);
        handle.shutdown().await;
    }
}
