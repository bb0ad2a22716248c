//! Core types for the ETA duration model
//!
//! Modules:
//! - `features`: raw duration records, price normalization and the fixed
//!   7-column feature layout shared by training and inference
//! - `gbdt`: boosted regression tree ensemble with native inference
//! - `serialization`: canonical JSON used for `meta.json` and model hashing
//! - `errors`: core error type

pub mod errors;
pub mod features;
pub mod gbdt;
pub mod serialization;

pub use errors::CoreError;
pub use features::{
    build_training_set, feature_row, features_for_order, DurationRecord, FeatureMatrix,
    FeatureMeta, Priority, PriceScale, TrainingSet, FEATURE_COUNT, FEATURE_NAMES,
    LEGACY_FEATURE_NAMES,
};
pub use gbdt::{mean_absolute_error, Node, Tree, TreeEnsemble};
