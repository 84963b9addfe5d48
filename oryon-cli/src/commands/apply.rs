//! Apply command - push a saved plan to GitHub

use clap::Args;
use oryon_core::{Config, Plan, Secrets};
use oryon_github::ApplyRequest;
use oryon_serve::Operator;
use std::path::{Path, PathBuf};

/// Apply a saved plan to a GitHub repository
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Repository as owner/name (defaults to the stored defaultRepo)
    #[arg(long)]
    repo: Option<String>,

    /// Plan JSON produced by `oryon plan --output`
    #[arg(long)]
    plan_file: PathBuf,

    /// Base branch
    #[arg(long)]
    base: Option<String>,

    /// Do not open a pull request
    #[arg(long)]
    no_pr: bool,
}

impl ApplyArgs {
    pub async fn execute(&self, config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
        let plan = read_plan(&self.plan_file)?;
        let operator = Operator::from_config(config, secrets)?;

        let repo = match &self.repo {
            Some(repo) => repo.clone(),
            None => {
                let fallback = operator.store().settings().default_repo;
                if fallback.is_empty() {
                    anyhow::bail!("repo missing (pass --repo or set a default with `oryon settings --default-repo`)");
                }
                fallback
            }
        };

        let request = ApplyRequest {
            repo,
            base_branch: self.base.clone(),
            plan,
            open_pr: !self.no_pr,
        };

        let recorded = operator.apply(&request).await;
        let outcome = recorded.result.map_err(anyhow::Error::msg)?;

        println!("Branch: {}", outcome.branch_name);
        match outcome.pr_url {
            Some(url) => println!("Pull request: {}", url),
            None => println!("No pull request opened"),
        }
        Ok(())
    }
}

/// Read a plan file, rejecting plans without a `changes` list
fn read_plan(path: &Path) -> anyhow::Result<Plan> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read plan file {}: {}", path.display(), e))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid plan JSON in {}: {}", path.display(), e))?;

    let plan = Plan::from_json(&value);
    if plan.changes.is_none() {
        anyhow::bail!("plan missing/invalid");
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_plan_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"{"summary":"s","branchName":"oryon/readme","changes":[{"path":"README.md","content":"hi"}]}"#,
        )
        .unwrap();

        let plan = read_plan(&path).unwrap();
        assert_eq!(plan.branch_name, "oryon/readme");
        assert_eq!(plan.change_count(), 1);
    }

    #[test]
    fn test_read_plan_without_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"summary":"s"}"#).unwrap();

        let err = read_plan(&path).unwrap_err();
        assert_eq!(err.to_string(), "plan missing/invalid");
    }

    #[test]
    fn test_read_plan_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(read_plan(&path).is_err());
    }
}
