//! `airsense-core` — domain foundation for the air-quality pipeline.
//!
//! This crate contains **pure domain** primitives (no I/O, no async):
//! readings, features, outlier bounds, numeric rules, and the closed
//! pipeline error taxonomy.

pub mod bounds;
pub mod error;
pub mod feature;
pub mod numeric;
pub mod reading;

pub use bounds::{Bounds, BoundsTable};
pub use error::{PipelineError, PipelineResult};
pub use feature::Feature;
pub use reading::{CanonicalReading, Prediction, RawReading, timestamp_key};
