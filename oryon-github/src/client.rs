//! GitHub API client using octocrab

use crate::{Error, Result};
use octocrab::Octocrab;
use tracing::info;

/// Repository coordinates parsed from `owner/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

/// GitHub API client bound to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for a repository with an explicit token
    ///
    /// `api_url` points the client at a GitHub Enterprise API root.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: &str,
        api_url: Option<&str>,
    ) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(url) = api_url {
            builder = builder
                .base_uri(url)
                .map_err(|e| Error::Auth(format!("Invalid GitHub API URL '{}': {}", url, e)))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a client from an `owner/name` string
    pub fn for_repo(repo: &str, token: &str, api_url: Option<&str>) -> Result<Self> {
        let RepoRef { owner, name } = parse_repo(repo)?;
        Self::new(owner, name, token, api_url)
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse `owner/name`
///
/// Only the first two `/`-separated segments are read; both must be non-empty.
pub fn parse_repo(repo: &str) -> Result<RepoRef> {
    let mut parts = repo.split('/');
    let owner = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();

    if owner.is_empty() || name.is_empty() {
        return Err(Error::InvalidRepo(repo.to_string()));
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
