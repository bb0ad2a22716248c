//! Error types for the ETA core crate

use thiserror::Error;

/// Errors that can occur while validating, hashing or persisting models
#[derive(Error, Debug)]
pub enum CoreError {
    /// Model structure is inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
