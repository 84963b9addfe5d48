//! Data models for the run-log state file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Chat,
    Plan,
    Apply,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

/// A finished invocation record
///
/// Runs are only constructed through [`PendingRun::succeed`] or
/// [`PendingRun::fail`], so every stored run carries a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Unique identifier for this run
    pub id: String,

    #[serde(rename = "type")]
    pub kind: RunKind,

    pub status: RunStatus,

    /// When the request started (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    pub duration_ms: i64,

    /// Request payload, as recorded
    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// A run in flight; never persisted
#[derive(Debug, Clone)]
pub struct PendingRun {
    id: String,
    kind: RunKind,
    started_at: DateTime<Utc>,
    input: Value,
}

impl PendingRun {
    /// Start a run now with a fresh id
    pub fn start(kind: RunKind, input: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            started_at: Utc::now(),
            input,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    /// Finish successfully with an output payload
    pub fn succeed(self, output: Value) -> Run {
        self.finish(RunStatus::Ok, Some(output), None)
    }

    /// Finish with an error message
    pub fn fail(self, error: impl Into<String>) -> Run {
        self.finish(RunStatus::Error, None, Some(error.into()))
    }

    fn finish(self, status: RunStatus, output: Option<Value>, error: Option<String>) -> Run {
        let duration_ms = (Utc::now() - self.started_at).num_milliseconds().max(0);
        Run {
            id: self.id,
            kind: self.kind,
            status,
            started_at: self.started_at,
            duration_ms,
            input: self.input,
            output,
            error,
        }
    }
}

/// Operator settings singleton
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Repository used when a request does not name one
    pub default_repo: String,
    pub autopush: bool,
}

/// Partial settings update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub default_repo: Option<String>,
    pub autopush: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(repo) = self.default_repo {
            settings.default_repo = repo;
        }
        if let Some(autopush) = self.autopush {
            settings.autopush = autopush;
        }
    }
}

/// The whole persisted document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Most recent first
    pub runs: Vec<Run>,
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_run_succeed() {
        let pending = PendingRun::start(RunKind::Chat, json!("hello"));
        let id = pending.id().to_string();

        let run = pending.succeed(json!("hi there"));
        assert_eq!(run.id, id);
        assert!(run.is_ok());
        assert!(run.duration_ms >= 0);
        assert_eq!(run.output, Some(json!("hi there")));
        assert!(run.error.is_none());
    }

    #[test]
    fn test_pending_run_fail() {
        let run = PendingRun::start(RunKind::Apply, json!({ "repo": "o/r" })).fail("boom");
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error.as_deref(), Some("boom"));
        assert!(run.output.is_none());
    }

    #[test]
    fn test_run_wire_format() {
        let run = PendingRun::start(RunKind::Plan, json!({ "task": "t" })).fail("nope");
        let value = serde_json::to_value(&run).unwrap();

        assert_eq!(value["type"], "plan");
        assert_eq!(value["status"], "error");
        assert!(value["startedAt"].is_i64());
        assert!(value["durationMs"].is_i64());
        assert!(value.get("output").is_none());
        assert_eq!(value["error"], "nope");
    }

    #[test]
    fn test_settings_patch_partial() {
        let mut settings = Settings {
            default_repo: "a/b".into(),
            autopush: false,
        };

        SettingsPatch {
            autopush: Some(true),
            ..Default::default()
        }
        .apply(&mut settings);

        assert_eq!(settings.default_repo, "a/b");
        assert!(settings.autopush);
    }

    #[test]
    fn test_state_defaults_from_empty_object() {
        let state: State = serde_json::from_str("{}").unwrap();
        assert!(state.runs.is_empty());
        assert_eq!(state.settings, Settings::default());
    }
}
