//! Regression losses for boosting
//!
//! Each loss provides the initial prediction, per-sample gradients and
//! hessians, and the value a finished leaf should take.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported regression losses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// L1 loss. Leaves are set to the median residual.
    AbsoluteError,
    /// Half squared error. Leaves use the Newton step `-G/(H + l2)`.
    SquaredError,
}

impl Loss {
    pub fn name(&self) -> &'static str {
        match self {
            Loss::AbsoluteError => "absolute_error",
            Loss::SquaredError => "squared_error",
        }
    }

    /// Best constant prediction for `targets`
    pub fn baseline(&self, targets: &[f64]) -> f64 {
        match self {
            Loss::AbsoluteError => median(targets),
            Loss::SquaredError => {
                if targets.is_empty() {
                    0.0
                } else {
                    targets.iter().sum::<f64>() / targets.len() as f64
                }
            }
        }
    }

    /// Fill gradients and hessians of the loss at the current raw predictions.
    ///
    /// Absolute error uses `+1` when the prediction is above the target and
    /// `-1` otherwise, with a constant hessian of 1.
    pub fn gradients(
        &self,
        targets: &[f64],
        raw: &[f64],
        gradients: &mut [f64],
        hessians: &mut [f64],
    ) {
        for i in 0..targets.len() {
            gradients[i] = match self {
                Loss::AbsoluteError => {
                    if raw[i] > targets[i] {
                        1.0
                    } else {
                        -1.0
                    }
                }
                Loss::SquaredError => raw[i] - targets[i],
            };
            hessians[i] = 1.0;
        }
    }

    /// Unshrunk value of a leaf holding `samples`
    pub fn leaf_value(
        &self,
        samples: &[usize],
        targets: &[f64],
        raw: &[f64],
        sum_gradients: f64,
        sum_hessians: f64,
        l2_regularization: f64,
    ) -> f64 {
        match self {
            Loss::AbsoluteError => {
                let residuals: Vec<f64> = samples.iter().map(|&i| targets[i] - raw[i]).collect();
                median(&residuals)
            }
            Loss::SquaredError => {
                let denom = sum_hessians + l2_regularization;
                if denom <= 0.0 {
                    0.0
                } else {
                    -sum_gradients / denom
                }
            }
        }
    }
}

/// Median with the mean of the two middle values for even lengths; 0 when empty
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
