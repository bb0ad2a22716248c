use eta_core::CoreError;
use thiserror::Error;

/// Errors returned by the trainer pipeline.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("shape mismatch: {rows} feature rows but {targets} targets")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error("model error: {0}")]
    Model(#[from] CoreError),

    #[error("export error: {0}")]
    Export(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}
