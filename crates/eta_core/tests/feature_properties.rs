//! Property tests for the feature layout
//!
//! Checks invariants that must hold for any dataset, not only the sample.

use eta_core::{
    build_training_set, features_for_order, DurationRecord, FeatureMeta, Priority, FEATURE_COUNT,
    FEATURE_NAMES,
};
use proptest::prelude::*;

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
    ]
}

fn record_strategy() -> impl Strategy<Value = DurationRecord> {
    (priority_strategy(), 0.0f64..10_000.0, 1.0f64..100_000.0)
        .prop_map(|(priority, price, duration)| DurationRecord::new(priority, price, duration))
}

proptest! {
    #[test]
    fn prop_bias_is_always_one(records in prop::collection::vec(record_strategy(), 1..64)) {
        let set = build_training_set(&records);
        prop_assert!(set.features.column(0).all(|v| v == 1.0));
    }

    #[test]
    fn prop_indicators_are_exclusive(records in prop::collection::vec(record_strategy(), 1..64)) {
        let set = build_training_set(&records);
        for (row, record) in set.features.rows().zip(&records) {
            let (high, medium) = (row[1], row[2]);
            prop_assert!(high == 0.0 || high == 1.0);
            prop_assert!(medium == 0.0 || medium == 1.0);
            prop_assert!(high + medium <= 1.0);
            match record.priority {
                Priority::High => prop_assert_eq!((high, medium), (1.0, 0.0)),
                Priority::Medium => prop_assert_eq!((high, medium), (0.0, 1.0)),
                Priority::Low => prop_assert_eq!((high, medium), (0.0, 0.0)),
            }
        }
    }

    #[test]
    fn prop_constant_prices_normalize_to_zero(
        priorities in prop::collection::vec(priority_strategy(), 1..32),
        price in 0.0f64..10_000.0,
    ) {
        let records: Vec<_> = priorities
            .into_iter()
            .map(|p| DurationRecord::new(p, price, 60.0))
            .collect();
        let set = build_training_set(&records);
        let scale = set.meta.price_scale.expect("scale is always fitted");

        prop_assert_eq!(scale.std, 1.0);
        prop_assert!(set.features.column(3).all(|v| v == 0.0));
        prop_assert!(set.features.column(4).all(|v| v == 0.0));
    }

    #[test]
    fn prop_layout_matches_meta(records in prop::collection::vec(record_strategy(), 0..32)) {
        let set = build_training_set(&records);
        prop_assert_eq!(set.features.n_cols(), FEATURE_COUNT);
        prop_assert_eq!(set.meta.names.len(), FEATURE_COUNT);
        for (name, expected) in set.meta.names.iter().zip(FEATURE_NAMES) {
            prop_assert_eq!(name.as_str(), expected);
        }
        prop_assert_eq!(set.targets.len(), records.len());
    }

    #[test]
    fn prop_meta_roundtrip_reproduces_rows(records in prop::collection::vec(record_strategy(), 1..32)) {
        let set = build_training_set(&records);
        let json = serde_json::to_string(&set.meta).unwrap();
        let meta: FeatureMeta = serde_json::from_str(&json).unwrap();

        for (i, record) in records.iter().enumerate() {
            let row = features_for_order(record.priority, Some(record.price), &meta);
            prop_assert_eq!(row.as_slice(), set.features.row(i));
        }
    }
}
