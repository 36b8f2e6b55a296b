//! Error types for the forest index

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, AnnoyError>;

/// Error types that can occur while building, querying or persisting an index
#[derive(Error, Debug)]
pub enum AnnoyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("Engine {op} failed for {}: {reason}", .path.display())]
    EngineFailure {
        op: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Index has been disposed")]
    Disposed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnnoyError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        AnnoyError::InvalidInput(reason.into())
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        AnnoyError::Corrupt(reason.into())
    }
}
