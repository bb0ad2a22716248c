//! ETA trainer - offline histogram GBDT trainer for order durations
//!
//! Loads duration records, builds the 7-column feature matrix, fits a
//! boosted tree ensemble and exports it to ONNX with a `meta.json` sidecar.

pub mod binning;
pub mod dataset;
pub mod errors;
pub mod grower;
pub mod loss;
pub mod onnx;
pub mod pipeline;
pub mod trainer;

pub use dataset::{Dataset, DatasetSource};
pub use errors::TrainerError;
pub use loss::Loss;
pub use pipeline::{export, run, train, ExportedArtifacts, PipelineConfig, TrainedModel};
pub use trainer::{HistGbdtTrainer, TrainingParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
