//! Pretrained regression artifact.
//!
//! The artifact is a random-forest regressor exported offline as JSON: one
//! flat-array node table per tree, the layout the training script emits.
//! It is loaded once at process start and immutable afterwards.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use airsense_core::{Feature, PipelineError, PipelineResult};

/// Sentinel used in the node arrays for "no child" / "leaf node".
const LEAF: i64 = -1;

/// One decision tree in flat-array form.
///
/// `children_left[i] == -1` marks node `i` as a leaf, in which case
/// `value[i]` is the tree's output. Interior nodes route on
/// `x[feature[i]] <= threshold[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl Tree {
    /// A single-leaf tree that always outputs `value`. Handy for smoke tests
    /// and as the degenerate trained case.
    pub fn leaf(value: f64) -> Self {
        Self {
            children_left: vec![LEAF],
            children_right: vec![LEAF],
            feature: vec![LEAF],
            threshold: vec![0.0],
            value: vec![value],
        }
    }

    fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn is_consistent(&self) -> bool {
        let n = self.node_count();
        n > 0
            && self.children_right.len() == n
            && self.feature.len() == n
            && self.threshold.len() == n
            && self.value.len() == n
    }

    /// Walk the tree for one feature vector.
    fn output(&self, x: &[f64]) -> PipelineResult<f64> {
        let n = self.node_count();
        let mut idx = 0usize;

        // Bounded by node count; a cycle in the arrays would otherwise loop
        // forever.
        for _ in 0..=n {
            if self.children_left[idx] == LEAF {
                return Ok(self.value[idx]);
            }

            let feat = usize::try_from(self.feature[idx])
                .map_err(|_| PipelineError::model(format!("negative feature index at node {idx}")))?;
            let v = *x
                .get(feat)
                .ok_or_else(|| PipelineError::model(format!("feature index {feat} out of range")))?;

            let next = if v <= self.threshold[idx] {
                self.children_left[idx]
            } else {
                self.children_right[idx]
            };
            idx = usize::try_from(next)
                .ok()
                .filter(|i| *i < n)
                .ok_or_else(|| PipelineError::model(format!("child index {next} out of range")))?;
        }

        Err(PipelineError::model("tree traversal did not terminate"))
    }
}

/// Opaque trained regressor: consumes the fixed 7-element feature vector,
/// returns one scalar (the forest mean).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Input feature names in vector order, recorded at export time.
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
}

impl ModelArtifact {
    /// Build an artifact from parts, validating shape and feature order.
    pub fn new(feature_names: Vec<String>, trees: Vec<Tree>) -> PipelineResult<Self> {
        let artifact = Self { feature_names, trees };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load the JSON export produced by the offline training run.
    pub fn load(path: &Path) -> PipelineResult<Arc<Self>> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::model(format!("cannot read {}: {e}", path.display())))?;
        let artifact: Self = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::model(format!("malformed artifact {}: {e}", path.display())))?;
        artifact.validate()?;

        info!(
            path = %path.display(),
            trees = artifact.trees.len(),
            "model artifact loaded"
        );
        Ok(Arc::new(artifact))
    }

    fn validate(&self) -> PipelineResult<()> {
        let expected: Vec<&str> = Feature::MODEL_INPUTS.iter().map(Feature::as_str).collect();
        if self.feature_names != expected {
            return Err(PipelineError::model(format!(
                "artifact feature order {:?} does not match expected {:?}",
                self.feature_names, expected
            )));
        }
        if self.trees.is_empty() {
            return Err(PipelineError::model("artifact contains no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if !tree.is_consistent() {
                return Err(PipelineError::model(format!(
                    "tree {i} has inconsistent node arrays"
                )));
            }
        }
        Ok(())
    }

    /// Run inference on one ordered feature vector.
    ///
    /// A non-finite forest output is a model error, never silently persisted.
    pub fn infer(&self, x: &[f64; 7]) -> PipelineResult<f64> {
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.output(x)?;
        }
        let out = sum / self.trees.len() as f64;
        if !out.is_finite() {
            return Err(PipelineError::model(format!("non-finite prediction: {out}")));
        }
        Ok(out)
    }

    /// Input feature names in vector order.
    pub fn input_names() -> Vec<String> {
        Feature::MODEL_INPUTS
            .iter()
            .map(|f| f.as_str().to_string())
            .collect()
    }
}
