//! Error types for beacon-journal

use thiserror::Error;

/// Journal error type
#[derive(Debug, Error)]
pub enum Error {
    /// Export error
    #[error("Export error: {0}")]
    ExportError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;
