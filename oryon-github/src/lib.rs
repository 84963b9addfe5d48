//! ORYON GitHub - GitHub integration for the ORYON operator
//!
//! This crate turns a change plan into a branch, one commit per file and a
//! pull request, using the GitHub REST API.

mod apply;
mod client;
mod error;
mod writer;

pub use apply::{apply_plan, apply_to_github, generate_branch_name, ApplyOutcome, ApplyRequest, DEFAULT_BASE_BRANCH};
pub use client::{parse_repo, GitHubClient, RepoRef};
pub use error::{Error, Result};
pub use writer::{FileWrite, NewPullRequest, RepoWriter};
