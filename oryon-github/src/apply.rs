//! Apply a change plan: branch, per-file commits, pull request
//!
//! Steps run strictly in order and stop at the first failure. Nothing is
//! rolled back: a failure after the branch exists leaves the branch and any
//! files already committed in place.

use oryon_core::Plan;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{parse_repo, Error, FileWrite, GitHubClient, NewPullRequest, RepoWriter, Result};

/// Base branch used when a request does not name one
pub const DEFAULT_BASE_BRANCH: &str = "main";

const DEFAULT_PR_TITLE: &str = "ORYON Operator changes";

/// A plan to apply to a repository
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    /// `owner/name`
    pub repo: String,
    pub base_branch: Option<String>,
    pub plan: Plan,
    pub open_pr: bool,
}

impl ApplyRequest {
    pub fn new(repo: impl Into<String>, plan: Plan) -> Self {
        Self {
            repo: repo.into(),
            base_branch: None,
            plan,
            open_pr: true,
        }
    }

    /// Base branch, defaulting to `main`
    pub fn base_branch(&self) -> &str {
        self.base_branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BASE_BRANCH)
    }
}

/// Result of a successful apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub branch_name: String,
    pub pr_url: Option<String>,
}

/// Generate a branch name of the form `oryon/<6 random chars>`
pub fn generate_branch_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("oryon/{}", suffix)
}

/// Validate the request, connect to GitHub and apply the plan
///
/// Repository format, plan shape and token presence are all checked before
/// any network call.
pub async fn apply_to_github(
    request: &ApplyRequest,
    token: Option<&str>,
    api_url: Option<&str>,
) -> Result<ApplyOutcome> {
    let repo = parse_repo(&request.repo)?;
    if request.plan.changes.is_none() {
        return Err(Error::InvalidPlan("plan missing/invalid".to_string()));
    }
    let token = token.filter(|t| !t.is_empty()).ok_or(Error::MissingToken)?;

    let client = GitHubClient::new(repo.owner, repo.name, token, api_url)?;
    apply_plan(&client, &request.plan, request.base_branch(), request.open_pr).await
}

/// Apply a plan through any [`RepoWriter`]
pub async fn apply_plan<W>(writer: &W, plan: &Plan, base_branch: &str, open_pr: bool) -> Result<ApplyOutcome>
where
    W: RepoWriter + ?Sized,
{
    let changes = plan
        .changes
        .as_deref()
        .ok_or_else(|| Error::InvalidPlan("plan missing/invalid".to_string()))?;

    let branch_name = if plan.branch_name.trim().is_empty() {
        generate_branch_name()
    } else {
        plan.branch_name.clone()
    };

    info!(branch = %branch_name, base = base_branch, files = changes.len(), "Applying plan");

    let sha = writer.branch_head(base_branch).await?;
    writer.create_branch(&branch_name, &sha).await?;

    for change in changes {
        let existing = writer.file_sha(&change.path, &branch_name).await?;
        let message = commit_message(plan, change.message.as_deref(), &change.path);

        writer
            .put_file(FileWrite {
                path: &change.path,
                content: &change.content,
                message: &message,
                branch: &branch_name,
                sha: existing.as_deref(),
            })
            .await?;

        debug!(path = %change.path, updated = existing.is_some(), "File committed");
    }

    let pr_url = if open_pr {
        let title = non_empty(&plan.commit_message).unwrap_or(DEFAULT_PR_TITLE);
        writer
            .open_pull_request(NewPullRequest {
                title,
                body: &plan.notes,
                head: &branch_name,
                base: base_branch,
            })
            .await?
    } else {
        None
    };

    info!(branch = %branch_name, pr_url = ?pr_url, "Plan applied");

    Ok(ApplyOutcome { branch_name, pr_url })
}

/// Per-file message, else the plan message, else a generated one
fn commit_message(plan: &Plan, file_message: Option<&str>, path: &str) -> String {
    file_message
        .and_then(non_empty)
        .or_else(|| non_empty(&plan.commit_message))
        .map(str::to_string)
        .unwrap_or_else(|| format!("ORYON Operator update: {}", path))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
