//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// GitHub answered with an error message
    #[error("GitHub API error: {0}")]
    Upstream(String),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// No GitHub token configured
    #[error("GITHUB_TOKEN missing")]
    MissingToken,

    /// Repository identifier is not `owner/name`
    #[error("repo must be owner/name")]
    InvalidRepo(String),

    /// Plan cannot be applied
    #[error("{0}")]
    InvalidPlan(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Convert an octocrab error, keeping GitHub's own message
    pub(crate) fn from_api(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                if source.message.contains("Bad credentials") {
                    Error::Auth("Invalid GitHub token".to_string())
                } else {
                    Error::Upstream(source.message)
                }
            }
            other => Error::Api(other),
        }
    }

    /// Whether GitHub reported the resource as missing
    pub(crate) fn is_not_found(err: &octocrab::Error) -> bool {
        matches!(err, octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found"))
    }
}
