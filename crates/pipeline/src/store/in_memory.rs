//! In-memory store for dev and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use airsense_core::{CanonicalReading, PipelineResult, Prediction};

use super::MeasurementStore;

/// BTreeMap-backed store keyed by the canonical timestamp string.
///
/// Key order is lexicographic, which for `YYYY-MM-DD HH:MM:SS` keys equals
/// chronological order, so ascending/descending scans fall out of iteration
/// order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    readings: Mutex<BTreeMap<String, CanonicalReading>>,
    predictions: Mutex<BTreeMap<String, Prediction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.lock().unwrap().len()
    }
}

#[async_trait]
impl MeasurementStore for InMemoryStore {
    async fn upsert_reading(&self, reading: &CanonicalReading) -> PipelineResult<()> {
        self.readings
            .lock()
            .unwrap()
            .insert(reading.key(), reading.clone());
        Ok(())
    }

    async fn upsert_prediction(&self, prediction: &Prediction) -> PipelineResult<()> {
        self.predictions
            .lock()
            .unwrap()
            .insert(prediction.key(), prediction.clone());
        Ok(())
    }

    async fn all_readings(&self) -> PipelineResult<Vec<CanonicalReading>> {
        Ok(self.readings.lock().unwrap().values().cloned().collect())
    }

    async fn recent_readings(&self, n: usize) -> PipelineResult<Vec<CanonicalReading>> {
        Ok(self
            .readings
            .lock()
            .unwrap()
            .values()
            .rev()
            .take(n)
            .cloned()
            .collect())
    }

    async fn recent_predictions(&self, n: usize) -> PipelineResult<Vec<Prediction>> {
        Ok(self
            .predictions
            .lock()
            .unwrap()
            .values()
            .rev()
            .take(n)
            .cloned()
            .collect())
    }

    async fn reading_count(&self) -> PipelineResult<usize> {
        Ok(self.readings.lock().unwrap().len())
    }
}
