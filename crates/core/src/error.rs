//! Pipeline error taxonomy.

use thiserror::Error;

use crate::feature::Feature;

/// Result type used across the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Closed error-kind enumeration for the whole pipeline.
///
/// The orchestrator's retry decision hangs off the *kind*, not the message:
/// transient infrastructure failures (`Network`, `Store`) get one retry,
/// everything else fails the current run immediately.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Sensor API unreachable, or a stage timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload or timestamp. Never retried.
    #[error("parse error: {0}")]
    Parse(String),

    /// A model input is absent from the reading. The affected prediction is
    /// skipped; the run otherwise continues.
    #[error("missing feature: {0}")]
    MissingFeature(Feature),

    /// Bounds lookup for an undeclared feature. Programmer error.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// Inference failure or a non-finite model output.
    #[error("model error: {0}")]
    Model(String),

    /// Store read/write failure.
    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unknown_feature(name: impl Into<String>) -> Self {
        Self::UnknownFeature(name.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether a failed run may be retried once before being recorded failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Store(_))
    }
}
