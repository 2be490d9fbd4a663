//! Per-feature outlier bounds (interquartile-range rule).
//!
//! Bounds are computed **offline** against a historical reference sample and
//! are immutable for the process lifetime. Recomputing them is an explicit
//! maintenance step, never part of a pipeline run.

use std::collections::HashMap;

use crate::error::{PipelineError, PipelineResult};
use crate::feature::Feature;
use crate::numeric::{quantile, round2};

/// Inclusive outlier bounds for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// IQR rule over a historical reference sample: non-finite values are
    /// dropped, then `lower = Q1 - 1.5*IQR`, `upper = Q3 + 1.5*IQR`, both
    /// rounded to 2 decimals. Returns `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mut clean: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if clean.is_empty() {
            return None;
        }
        clean.sort_by(f64::total_cmp);

        let q1 = quantile(&clean, 0.25);
        let q3 = quantile(&clean, 0.75);
        let iqr = q3 - q1;

        Some(Self {
            lower: round2(q1 - 1.5 * iqr),
            upper: round2(q3 + 1.5 * iqr),
        })
    }

    /// Membership test. Bounds are inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Static feature → bounds mapping consumed by the cleaner.
///
/// Read-only at runtime; lookup of an undeclared feature is a typed error,
/// not a panic.
#[derive(Debug, Clone)]
pub struct BoundsTable {
    entries: HashMap<Feature, Bounds>,
}

impl BoundsTable {
    pub fn new(entries: impl IntoIterator<Item = (Feature, Bounds)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn bounds(&self, feature: Feature) -> PipelineResult<Bounds> {
        self.entries
            .get(&feature)
            .copied()
            .ok_or_else(|| PipelineError::unknown_feature(feature.as_str()))
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.entries.contains_key(&feature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BoundsTable {
    /// Bounds computed offline against the deployment's historical reference
    /// sample, already rounded to 2 decimals.
    fn default() -> Self {
        Self::new([
            (Feature::Pm1, Bounds::new(-20.21, 44.87)),
            (Feature::Pm25, Bounds::new(-27.27, 68.12)),
            (Feature::RelativeHumidity, Bounds::new(28.96, 79.25)),
            (Feature::Temperature, Bounds::new(18.01, 34.06)),
            (Feature::Pm03, Bounds::new(-463.41, 2010.77)),
        ])
    }
}
