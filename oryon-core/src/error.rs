//! Error types for the ORYON operator

use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for operator operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connection refused, DNS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A required credential is not configured (e.g. `OPENAI_API_KEY`)
    #[error("{0} missing")]
    MissingCredential(String),

    /// Upstream provider rejected the request or answered with an error
    #[error("{0}")]
    Provider(String),

    /// Provider name not known to the registry
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Every provider failed in ensemble mode
    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),

    /// Model output did not contain a JSON object
    #[error("Model did not return JSON")]
    NoJson,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
