//! Repository write operations used by the apply pipeline

use async_trait::async_trait;
use octocrab::params::repos::Reference;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, GitHubClient, Result};

/// One create-or-update contents call
#[derive(Debug, Clone, Copy)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    /// Full file content, UTF-8 (base64-encoded on the wire)
    pub content: &'a str,
    pub message: &'a str,
    pub branch: &'a str,
    /// Blob SHA of the existing file; `None` creates the file
    pub sha: Option<&'a str>,
}

/// Pull request to open
#[derive(Debug, Clone, Copy)]
pub struct NewPullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

/// Write access to a single repository
#[async_trait]
pub trait RepoWriter: Send + Sync {
    /// Commit SHA at the head of a branch
    async fn branch_head(&self, branch: &str) -> Result<String>;

    /// Create `refs/heads/{branch}` at `sha`
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()>;

    /// Blob SHA of a file on a branch, `None` when GitHub answers 404
    async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>>;

    /// Create or update a file with a commit
    async fn put_file(&self, write: FileWrite<'_>) -> Result<()>;

    /// Open a pull request and return its web URL
    async fn open_pull_request(&self, pr: NewPullRequest<'_>) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

#[async_trait]
impl RepoWriter for GitHubClient {
    async fn branch_head(&self, branch: &str) -> Result<String> {
        debug!(branch, "Fetching branch head");

        let route = format!("/repos/{}/{}/branches/{}", self.owner(), self.repo(), branch);
        let info: BranchInfo = self
            .client()
            .get(route, None::<&()>)
            .await
            .map_err(|e| {
                if Error::is_not_found(&e) {
                    Error::Other(format!("Branch '{}' not found", branch))
                } else {
                    Error::from_api(e)
                }
            })?;

        Ok(info.commit.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        debug!(branch, sha, "Creating branch");

        self.client()
            .repos(self.owner(), self.repo())
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await
            .map_err(Error::from_api)?;

        Ok(())
    }

    async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        let result = self
            .client()
            .repos(self.owner(), self.repo())
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await;

        match result {
            Ok(items) => Ok(items
                .items
                .into_iter()
                .find(|item| item.path == path)
                .map(|item| item.sha)),
            Err(e) if Error::is_not_found(&e) => {
                debug!(path, branch, "File not found, will create");
                Ok(None)
            }
            Err(e) => Err(Error::from_api(e)),
        }
    }

    async fn put_file(&self, write: FileWrite<'_>) -> Result<()> {
        debug!(path = write.path, branch = write.branch, update = write.sha.is_some(), "Writing file");

        let repos = self.client().repos(self.owner(), self.repo());
        let builder = match write.sha {
            Some(sha) => repos.update_file(write.path, write.message, write.content, sha),
            None => repos.create_file(write.path, write.message, write.content),
        };

        builder
            .branch(write.branch)
            .send()
            .await
            .map_err(Error::from_api)?;

        Ok(())
    }

    async fn open_pull_request(&self, pr: NewPullRequest<'_>) -> Result<Option<String>> {
        debug!(head = pr.head, base = pr.base, "Opening pull request");

        let created = self
            .client()
            .pulls(self.owner(), self.repo())
            .create(pr.title, pr.head, pr.base)
            .body(pr.body)
            .send()
            .await
            .map_err(Error::from_api)?;

        Ok(created.html_url.map(|url| url.to_string()))
    }
}
