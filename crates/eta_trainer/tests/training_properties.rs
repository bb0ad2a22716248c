//! Property tests for binning and tree growth

use eta_core::{build_training_set, DurationRecord, FeatureMatrix, Priority};
use eta_trainer::binning::BinMapper;
use eta_trainer::{HistGbdtTrainer, TrainingParams};
use proptest::prelude::*;

fn record_strategy() -> impl Strategy<Value = DurationRecord> {
    (0u8..3, 50.0f64..900.0, 300.0f64..7_200.0).prop_map(|(p, price, duration)| {
        let priority = match p {
            0 => Priority::High,
            1 => Priority::Medium,
            _ => Priority::Low,
        };
        DurationRecord::new(priority, price, duration)
    })
}

proptest! {
    #[test]
    fn prop_bin_split_matches_raw_threshold(
        values in prop::collection::vec(-1_000.0f32..1_000.0, 1..300),
        max_bins in 2usize..=255,
    ) {
        let matrix = FeatureMatrix::from_flat(values.clone(), 1).expect("one column");
        let mapper = BinMapper::fit(&matrix, max_bins);
        prop_assert!(mapper.n_bins(0) <= max_bins);

        for b in 0..mapper.n_bins(0) - 1 {
            let threshold = mapper.threshold(0, b);
            for &v in &values {
                let goes_left = mapper.bin_of(0, v) as usize <= b;
                prop_assert_eq!(goes_left, v <= threshold);
            }
        }
    }

    #[test]
    fn prop_trees_respect_structural_limits(
        records in prop::collection::vec(record_strategy(), 2..80),
        max_depth in 1usize..5,
        max_leaf_nodes in 2usize..10,
    ) {
        let set = build_training_set(&records);
        let params = TrainingParams {
            max_iter: 5,
            max_depth: Some(max_depth),
            max_leaf_nodes: Some(max_leaf_nodes),
            min_samples_leaf: 1,
            ..TrainingParams::default()
        };
        let model = HistGbdtTrainer::new(params)
            .fit(&set.features, &set.targets)
            .expect("valid params");

        prop_assert_eq!(model.num_trees(), 5);
        for tree in &model.trees {
            prop_assert!(tree.depth() <= max_depth);
            prop_assert!(tree.leaf_count() <= max_leaf_nodes);
        }
    }
}
