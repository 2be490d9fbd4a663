//! Cleaner / feature builder.
//!
//! Order of operations is fixed: round channels to 2 decimals, derive the
//! calendar features, then test every present value that has a bounds entry.
//! A single violation excludes the whole record — partial masking would
//! break the fixed-length feature vector the model consumes.

use std::collections::BTreeMap;

use tracing::debug;

use airsense_core::{BoundsTable, CanonicalReading, Feature, RawReading};

/// Result of cleaning one raw reading.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanOutcome {
    Kept(CanonicalReading),
    /// The whole record was dropped because `feature` carried `value`
    /// outside its configured bounds.
    Excluded { feature: Feature, value: f64 },
}

impl CleanOutcome {
    pub fn kept(self) -> Option<CanonicalReading> {
        match self {
            CleanOutcome::Kept(reading) => Some(reading),
            CleanOutcome::Excluded { .. } => None,
        }
    }
}

/// Clean one raw reading against the bounds table.
///
/// Deterministic and idempotent: the same input always yields the same
/// canonical reading or the same exclusion. Missing channels pass the bounds
/// check; missingness is decided at prediction time, not here.
pub fn clean(raw: &RawReading, bounds: &BoundsTable) -> CleanOutcome {
    let canonical = CanonicalReading::from_raw(raw);

    for feature in Feature::CHANNELS {
        let Some(value) = canonical.feature(feature) else {
            continue;
        };
        // A channel without a bounds entry is simply unbounded.
        let Ok(b) = bounds.bounds(feature) else {
            continue;
        };
        if !b.contains(value) {
            debug!(
                key = %canonical.key(),
                %feature,
                value,
                lower = b.lower,
                upper = b.upper,
                "record excluded by outlier bounds"
            );
            return CleanOutcome::Excluded { feature, value };
        }
    }

    CleanOutcome::Kept(canonical)
}

/// Batch variant over an ordered sequence of raw readings.
///
/// Applies the same per-record rule, deduplicates on the canonical timestamp
/// key keeping the **later** record, and yields kept readings ascending by
/// timestamp. The returned sequence is finite and consumed once.
pub fn clean_batch<I>(readings: I, bounds: &BoundsTable) -> impl Iterator<Item = CanonicalReading>
where
    I: IntoIterator<Item = RawReading>,
{
    let mut by_key: BTreeMap<String, CanonicalReading> = BTreeMap::new();
    for raw in readings {
        if let CleanOutcome::Kept(reading) = clean(&raw, bounds) {
            // Insert overwrites: last write wins per key.
            by_key.insert(reading.key(), reading);
        }
    }
    by_key.into_values()
}
