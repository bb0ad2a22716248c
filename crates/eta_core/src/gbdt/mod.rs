//! Gradient boosted regression trees
//!
//! Model types produced by the trainer and consumed by the ONNX exporter.
//! Serialized as canonical JSON for hashing:
//!
//! ```json
//! {
//!   "baseline": 3100.0,
//!   "learning_rate": 0.12,
//!   "n_features": 7,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"feature_idx":1,"id":0,"leaf":null,"left":1,"right":2,"threshold":0.5},
//!         {"feature_idx":-1,"id":1,"leaf":12.0,"left":-1,"right":-1,"threshold":0.0},
//!         {"feature_idx":-1,"id":2,"leaf":-36.0,"left":-1,"right":-1,"threshold":0.0}
//!       ]
//!     }
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{TreeEnsemble, MODEL_VERSION};
pub use tree::{Node, Tree};

/// Mean absolute error between targets and predictions.
///
/// Returns 0 for empty input. Extra elements of the longer slice are ignored.
pub fn mean_absolute_error(targets: &[f32], predictions: &[f64]) -> f64 {
    let n = targets.len().min(predictions.len());
    if n == 0 {
        return 0.0;
    }

    let total: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(&y, &p)| (f64::from(y) - p).abs())
        .sum();

    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mae() {
        let y = [1.0f32, 2.0, 3.0];
        let p = [1.5, 2.0, 1.0];
        assert!((mean_absolute_error(&y, &p) - 2.5 / 3.0).abs() < 1e-12);
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
    }
}
