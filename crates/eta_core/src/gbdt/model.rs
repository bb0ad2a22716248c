//! Boosted tree ensemble with native inference
//!
//! A prediction is `baseline + sum(tree.evaluate(x))`. Leaf values already
//! carry the learning rate, so no per-tree weight is stored.

use super::tree::Tree;
use crate::errors::{CoreError, Result};
use crate::features::FeatureMatrix;
use crate::serialization::{canonical_json_bytes, canonical_json_string};
use serde::{Deserialize, Serialize};

/// Current ensemble format version
pub const MODEL_VERSION: i32 = 1;

/// Additive ensemble of regression trees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnsemble {
    /// Model format version
    pub version: i32,

    /// Width of the input feature vector
    pub n_features: usize,

    /// Initial prediction before any tree is applied
    pub baseline: f64,

    /// Shrinkage the leaves were multiplied by during training
    pub learning_rate: f64,

    /// Decision trees in boosting order
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(n_features: usize, baseline: f64, learning_rate: f64, trees: Vec<Tree>) -> Self {
        Self {
            version: MODEL_VERSION,
            n_features,
            baseline,
            learning_rate,
            trees,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(CoreError::InvalidModel(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.n_features == 0 {
            return Err(CoreError::InvalidModel("Model has no input features".into()));
        }

        if !self.baseline.is_finite() {
            return Err(CoreError::InvalidModel(format!(
                "Non-finite baseline: {}",
                self.baseline
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| {
                CoreError::InvalidModel(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Predict a single row
    pub fn predict_row(&self, features: &[f32]) -> f64 {
        self.trees
            .iter()
            .fold(self.baseline, |acc, tree| acc + tree.evaluate(features))
    }

    /// Predict every row of a matrix
    pub fn predict(&self, features: &FeatureMatrix) -> Vec<f64> {
        features.rows().map(|row| self.predict_row(row)).collect()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn total_leaves(&self) -> usize {
        self.trees.iter().map(Tree::leaf_count).sum()
    }

    /// Canonical JSON (sorted keys, 2-space indent)
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(canonical_json_string(self)?)
    }

    /// BLAKE3 hash of the canonical JSON, hex encoded
    pub fn hash_hex(&self) -> Result<String> {
        let bytes = canonical_json_bytes(self)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}
