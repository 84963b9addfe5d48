//! Error types for run-log storage

use thiserror::Error;

/// Store error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path could not be determined
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;
