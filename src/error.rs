//! Error types for Blockpulse

use thiserror::Error;

/// Errors that can occur during encoding, training, or inference
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Degenerate batch: max {0} is zero, normalization undefined")]
    DegenerateBatch(&'static str),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
