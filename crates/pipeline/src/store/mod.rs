//! Persistence contract for canonical readings and predictions.
//!
//! Two logical collections ("measurements" and "predictions"), both keyed by
//! the canonical timestamp string. Every write is an upsert: repeated writes
//! for the same key are commutative and leave exactly one record, which is
//! what lets a cancelled run be safely overwritten by the next one.

use async_trait::async_trait;

use airsense_core::{CanonicalReading, PipelineResult, Prediction};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Upsert-keyed document store for the pipeline.
///
/// The core depends only on this contract, never on a specific engine.
/// Failures surface as `PipelineError::Store` (retryable).
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Insert or replace the reading stored under its timestamp key.
    async fn upsert_reading(&self, reading: &CanonicalReading) -> PipelineResult<()>;

    /// Insert or replace the prediction stored under its timestamp key.
    async fn upsert_prediction(&self, prediction: &Prediction) -> PipelineResult<()>;

    /// All readings, ascending by timestamp.
    async fn all_readings(&self) -> PipelineResult<Vec<CanonicalReading>>;

    /// At most `n` readings, descending by timestamp.
    async fn recent_readings(&self, n: usize) -> PipelineResult<Vec<CanonicalReading>>;

    /// The most recent reading, if any.
    async fn latest_reading(&self) -> PipelineResult<Option<CanonicalReading>> {
        Ok(self.recent_readings(1).await?.into_iter().next())
    }

    /// At most `n` predictions, descending by timestamp.
    async fn recent_predictions(&self, n: usize) -> PipelineResult<Vec<Prediction>>;

    /// Number of stored readings.
    async fn reading_count(&self) -> PipelineResult<usize>;
}
