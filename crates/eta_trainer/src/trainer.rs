//! Histogram gradient boosted regression trainer
//!
//! Starts from the loss baseline, then repeatedly fits a tree to the loss
//! gradients on binned features and adds its shrunk leaf values to the raw
//! predictions. Every iteration runs; there is no validation split and no
//! early stopping.

use eta_core::{FeatureMatrix, Node, Tree, TreeEnsemble};

use crate::binning::{BinMapper, MAX_BINS_LIMIT};
use crate::errors::TrainerError;
use crate::grower::{GrowerParams, GrownNode, TreeGrower};
use crate::loss::Loss;

/// Boosting hyperparameters
#[derive(Clone, Debug)]
pub struct TrainingParams {
    pub loss: Loss,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Nodes at this depth (root = 0) become leaves
    pub max_depth: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    pub l2_regularization: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            loss: Loss::AbsoluteError,
            max_iter: 400,
            learning_rate: 0.12,
            max_depth: Some(6),
            max_leaf_nodes: Some(31),
            min_samples_leaf: 20,
            max_bins: 255,
            l2_regularization: 0.0,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.max_iter == 0 {
            return Err(TrainerError::InvalidParams("max_iter must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainerError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == Some(0) {
            return Err(TrainerError::InvalidParams("max_depth must be at least 1".into()));
        }
        if self.max_leaf_nodes.is_some_and(|n| n < 2) {
            return Err(TrainerError::InvalidParams("max_leaf_nodes must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainerError::InvalidParams(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if !(2..=MAX_BINS_LIMIT).contains(&self.max_bins) {
            return Err(TrainerError::InvalidParams(format!(
                "max_bins must be in 2..={}, got {}",
                MAX_BINS_LIMIT, self.max_bins
            )));
        }
        if !(self.l2_regularization.is_finite() && self.l2_regularization >= 0.0) {
            return Err(TrainerError::InvalidParams(
                "l2_regularization must be non-negative".into(),
            ));
        }
        Ok(())
    }

    fn grower_params(&self) -> GrowerParams {
        GrowerParams {
            max_depth: self.max_depth,
            max_leaf_nodes: self.max_leaf_nodes,
            min_samples_leaf: self.min_samples_leaf,
            l2_regularization: self.l2_regularization,
            ..GrowerParams::default()
        }
    }
}

/// Histogram GBDT trainer
pub struct HistGbdtTrainer {
    params: TrainingParams,
}

impl HistGbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    /// Fit an ensemble on `features` against `targets`
    pub fn fit(&self, features: &FeatureMatrix, targets: &[f32]) -> Result<TreeEnsemble, TrainerError> {
        self.params.validate()?;

        let n_samples = features.n_rows();
        if n_samples != targets.len() {
            return Err(TrainerError::ShapeMismatch {
                rows: n_samples,
                targets: targets.len(),
            });
        }
        if n_samples == 0 {
            return Err(TrainerError::EmptyDataset);
        }

        let loss = self.params.loss;
        let y: Vec<f64> = targets.iter().map(|&t| f64::from(t)).collect();

        let mapper = BinMapper::fit(features, self.params.max_bins);
        let binned = mapper.transform(features);
        for feature in 0..mapper.n_features() {
            tracing::debug!("Feature {}: {} bins", feature, mapper.n_bins(feature));
        }

        let baseline = loss.baseline(&y);
        let mut raw = vec![baseline; n_samples];
        let mut gradients = vec![0.0; n_samples];
        let mut hessians = vec![0.0; n_samples];

        let mut trees = Vec::with_capacity(self.params.max_iter);

        for iteration in 0..self.params.max_iter {
            loss.gradients(&y, &raw, &mut gradients, &mut hessians);

            let grown = TreeGrower::new(
                &binned,
                &mapper,
                &gradients,
                &hessians,
                self.params.grower_params(),
            )
            .grow();

            let tree = self.finalize_tree(&grown, &y, &mut raw);

            tracing::debug!(
                "Iteration {}/{}: {} leaves, depth {}",
                iteration + 1,
                self.params.max_iter,
                tree.leaf_count(),
                tree.depth()
            );

            trees.push(tree);
        }

        let model = TreeEnsemble::new(
            features.n_cols(),
            baseline,
            self.params.learning_rate,
            trees,
        );
        model.validate()?;

        Ok(model)
    }

    /// Assign leaf values, update raw predictions and convert to model nodes
    fn finalize_tree(&self, grown: &[GrownNode], targets: &[f64], raw: &mut [f64]) -> Tree {
        // Leaf values are computed before any raw prediction moves
        let current: &[f64] = raw;
        let leaf_values: Vec<Option<f64>> = grown
            .iter()
            .map(|node| {
                node.is_leaf().then(|| {
                    self.params.loss.leaf_value(
                        &node.samples,
                        targets,
                        current,
                        node.sum_gradients,
                        node.sum_hessians,
                        self.params.l2_regularization,
                    ) * self.params.learning_rate
                })
            })
            .collect();

        let mut nodes = Vec::with_capacity(grown.len());
        for (idx, (node, value)) in grown.iter().zip(&leaf_values).enumerate() {
            let id = idx as i32;
            match (&node.split, value) {
                (Some(split), _) => nodes.push(Node::internal(
                    id,
                    split.feature as i32,
                    split.threshold,
                    node.left as i32,
                    node.right as i32,
                )),
                (None, Some(value)) => {
                    for &i in &node.samples {
                        raw[i] += value;
                    }
                    nodes.push(Node::leaf(id, *value));
                }
                (None, None) => nodes.push(Node::leaf(id, 0.0)),
            }
        }

        Tree::new(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eta_core::{build_training_set, mean_absolute_error, DurationRecord, Priority};

    fn sample_set() -> eta_core::TrainingSet {
        let rows = [
            (Priority::High, 200.0, 1800.0),
            (Priority::Medium, 400.0, 3200.0),
            (Priority::Low, 300.0, 3000.0),
            (Priority::High, 250.0, 2000.0),
            (Priority::Medium, 450.0, 3600.0),
            (Priority::Low, 350.0, 3400.0),
            (Priority::High, 280.0, 2200.0),
            (Priority::Medium, 420.0, 3300.0),
            (Priority::Low, 380.0, 3100.0),
        ];
        let records: Vec<_> = rows
            .iter()
            .map(|&(p, price, d)| DurationRecord::new(p, price, d))
            .collect();
        build_training_set(&records)
    }

    #[test]
    fn test_default_params() {
        let p = TrainingParams::default();
        assert_eq!(p.loss, Loss::AbsoluteError);
        assert_eq!(p.max_iter, 400);
        assert_eq!(p.max_depth, Some(6));
        assert_eq!(p.learning_rate, 0.12);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let bad = [
            TrainingParams { max_iter: 0, ..Default::default() },
            TrainingParams { learning_rate: 0.0, ..Default::default() },
            TrainingParams { max_depth: Some(0), ..Default::default() },
            TrainingParams { max_leaf_nodes: Some(1), ..Default::default() },
            TrainingParams { min_samples_leaf: 0, ..Default::default() },
            TrainingParams { max_bins: 256, ..Default::default() },
            TrainingParams { l2_regularization: -1.0, ..Default::default() },
        ];
        for params in bad {
            assert!(matches!(params.validate(), Err(TrainerError::InvalidParams(_))));
        }
    }

    #[test]
    fn test_sample_with_defaults_predicts_median() -> Result<(), TrainerError> {
        let set = sample_set();
        let model = HistGbdtTrainer::new(TrainingParams::default()).fit(&set.features, &set.targets)?;

        assert_eq!(model.baseline, 3100.0);
        assert_eq!(model.num_trees(), 400);
        assert!(model.trees.iter().all(|t| t.nodes.len() == 1));

        let preds = model.predict(&set.features);
        assert!(preds.iter().all(|&p| p == 3100.0));
        assert_eq!(mean_absolute_error(&set.targets, &preds), 500.0);
        Ok(())
    }

    #[test]
    fn test_small_leaves_fit_better_than_median() -> Result<(), TrainerError> {
        let set = sample_set();
        let params = TrainingParams {
            min_samples_leaf: 1,
            max_iter: 100,
            ..Default::default()
        };
        let model = HistGbdtTrainer::new(params).fit(&set.features, &set.targets)?;

        let mae = mean_absolute_error(&set.targets, &model.predict(&set.features));
        assert!(mae < 500.0, "mae {}", mae);
        assert!(model.trees.iter().any(|t| t.nodes.len() > 1));
        Ok(())
    }

    #[test]
    fn test_squared_error_loss() -> Result<(), TrainerError> {
        let set = sample_set();
        let params = TrainingParams {
            loss: Loss::SquaredError,
            min_samples_leaf: 1,
            max_iter: 200,
            ..Default::default()
        };
        let model = HistGbdtTrainer::new(params).fit(&set.features, &set.targets)?;

        assert!((model.baseline - 25600.0 / 9.0).abs() < 1e-9);
        let mae = mean_absolute_error(&set.targets, &model.predict(&set.features));
        assert!(mae < 100.0, "mae {}", mae);
        Ok(())
    }

    #[test]
    fn test_training_is_deterministic() -> Result<(), TrainerError> {
        let set = sample_set();
        let params = TrainingParams {
            min_samples_leaf: 2,
            max_iter: 20,
            ..Default::default()
        };
        let m1 = HistGbdtTrainer::new(params.clone()).fit(&set.features, &set.targets)?;
        let m2 = HistGbdtTrainer::new(params).fit(&set.features, &set.targets)?;

        assert_eq!(m1, m2);
        assert_eq!(m1.hash_hex()?, m2.hash_hex()?);
        Ok(())
    }

    #[test]
    fn test_empty_dataset() {
        let set = build_training_set(&[]);
        let result = HistGbdtTrainer::new(TrainingParams::default()).fit(&set.features, &set.targets);
        assert!(matches!(result, Err(TrainerError::EmptyDataset)));
    }

    #[test]
    fn test_shape_mismatch() {
        let set = sample_set();
        let result =
            HistGbdtTrainer::new(TrainingParams::default()).fit(&set.features, &set.targets[..3]);
        assert!(matches!(
            result,
            Err(TrainerError::ShapeMismatch { rows: 9, targets: 3 })
        ));
    }
}
