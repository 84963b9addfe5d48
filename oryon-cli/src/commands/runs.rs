//! Runs and settings commands - inspect the run-log

use chrono::Local;
use clap::Args;
use oryon_core::Config;
use oryon_store::{Run, RunKind, RunStatus, SettingsPatch};

use super::open_store;

/// List recorded runs
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Maximum number of runs to show
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,

    /// Print raw JSON
    #[arg(long)]
    json: bool,
}

impl RunsArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config)?;
        let runs: Vec<Run> = store.runs().into_iter().take(self.limit).collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&runs)?);
            return Ok(());
        }

        if runs.is_empty() {
            println!("No runs recorded.");
            return Ok(());
        }

        for run in &runs {
            println!("{}", format_run(run));
        }
        Ok(())
    }
}

/// One-line summary of a run
fn format_run(run: &Run) -> String {
    let started = run.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let kind = match run.kind {
        RunKind::Chat => "chat",
        RunKind::Plan => "plan",
        RunKind::Apply => "apply",
    };
    let status = match run.status {
        RunStatus::Ok => "ok",
        RunStatus::Error => "error",
    };

    let mut line = format!(
        "{}  {:<5}  {:<5}  {:>6}ms  {}",
        started,
        kind,
        status,
        run.duration_ms,
        run.id
    );
    if let Some(error) = &run.error {
        line.push_str(&format!("  {}", error));
    }
    line
}

/// Show or update stored settings
#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Repository used by apply when none is given
    #[arg(long)]
    default_repo: Option<String>,

    /// Autopush preference
    #[arg(long)]
    autopush: Option<bool>,
}

impl SettingsArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config)?;

        let settings = if self.default_repo.is_some() || self.autopush.is_some() {
            store.update_settings(SettingsPatch {
                default_repo: self.default_repo.clone(),
                autopush: self.autopush,
            })?
        } else {
            store.settings()
        };

        let default_repo = if settings.default_repo.is_empty() {
            "(none)"
        } else {
            settings.default_repo.as_str()
        };
        println!("defaultRepo: {}", default_repo);
        println!("autopush:    {}", settings.autopush);
        Ok(())
    }
}
