//! Forecasting against canonical readings.

use std::sync::Arc;

use tracing::debug;

use airsense_core::numeric::round_dp;
use airsense_core::{CanonicalReading, Feature, PipelineError, PipelineResult, Prediction};

use crate::artifact::ModelArtifact;
use crate::metrics::Metrics;

/// Forecasts the next-hour pollutant value from a canonical reading.
///
/// Two precision policies apply, both deliberate:
/// - [`Predictor::predict_next`] rounds to **1 decimal** — the single-shot
///   forecast surfaced to users;
/// - [`Predictor::predict_for`] rounds to **2 decimals** — the
///   backtest/evaluation form compared against stored actuals.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
}

impl Predictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    /// Assemble the fixed 7-element feature vector in declared order.
    ///
    /// No imputation: the first absent input fails with `MissingFeature`.
    pub fn feature_vector(reading: &CanonicalReading) -> PipelineResult<[f64; 7]> {
        let mut x = [0.0; 7];
        for (slot, feature) in x.iter_mut().zip(Feature::MODEL_INPUTS) {
            *slot = reading
                .feature(feature)
                .ok_or(PipelineError::MissingFeature(feature))?;
        }
        Ok(x)
    }

    /// Next-hour forecast for the given reading (single-shot policy, 1dp).
    pub fn predict_next(&self, reading: &CanonicalReading) -> PipelineResult<Prediction> {
        self.predict_rounded(reading, 1)
    }

    /// Backtest-precision forecast for the given reading (2dp).
    pub fn predict_for(&self, reading: &CanonicalReading) -> PipelineResult<Prediction> {
        self.predict_rounded(reading, 2)
    }

    fn predict_rounded(&self, reading: &CanonicalReading, dp: u32) -> PipelineResult<Prediction> {
        let x = Self::feature_vector(reading)?;
        let raw = self.artifact.infer(&x)?;
        let predicted = round_dp(raw, dp);

        debug!(key = %reading.key(), predicted, "forecast produced");
        Ok(Prediction {
            timestamp: reading.timestamp,
            predicted_pm25: predicted,
        })
    }

    /// Score the model over a batch of readings.
    ///
    /// Only rows carrying an actual target value *and* all 7 inputs
    /// participate; a batch with no such rows yields `None`, not a zeroed
    /// report.
    pub fn evaluate(&self, readings: &[CanonicalReading]) -> PipelineResult<Option<Metrics>> {
        let mut actual = Vec::new();
        let mut predicted = Vec::new();

        for reading in readings {
            let Some(target) = reading.pm25 else { continue };
            let Ok(x) = Self::feature_vector(reading) else { continue };
            actual.push(target);
            predicted.push(self.artifact.infer(&x)?);
        }

        if actual.is_empty() {
            return Ok(None);
        }
        Ok(Some(Metrics::from_pairs(&actual, &predicted)))
    }
}
