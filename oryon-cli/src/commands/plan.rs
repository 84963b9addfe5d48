//! Plan command - turn a task into a change plan

use clap::Args;
use oryon_core::{Config, Plan, PlanRequest, Secrets};
use oryon_serve::Operator;
use std::path::PathBuf;

use super::mode_flag;

/// Generate a change plan for a task
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Task description
    #[arg(long)]
    task: String,

    /// File whose content is passed as repository context
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Ask every enabled provider and merge the answers
    #[arg(long)]
    ensemble: bool,

    /// Write the plan JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl PlanArgs {
    pub async fn execute(&self, config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
        let mut request = PlanRequest::new(&self.task).with_mode(mode_flag(self.ensemble));
        if let Some(path) = &self.context_file {
            let context = std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read context file {}: {}", path.display(), e)
            })?;
            request = request.with_repo_context(context);
        }

        let operator = Operator::from_config(config, secrets)?;
        let recorded = operator.plan(&request).await;
        let plan = recorded.result.map_err(anyhow::Error::msg)?;

        let json = serde_json::to_string_pretty(&plan)?;
        match &self.output {
            Some(path) => {
                std::fs::write(path, format!("{}\n", json))?;
                print_summary(&plan);
                println!("Plan written to {}", path.display());
            }
            None => println!("{}", json),
        }

        Ok(())
    }
}

fn print_summary(plan: &Plan) {
    if !plan.summary.is_empty() {
        println!("{}", plan.summary);
    }
    println!("  branch: {}", non_empty_or(&plan.branch_name, "(generated)"));
    println!("  files:  {}", plan.change_count());
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
