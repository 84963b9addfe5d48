//! Change-plan generation and extraction

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::provider::{Mode, ProviderRouter};
use crate::{Error, Result};

/// System prompt constraining the model to the plan contract
pub const PLAN_SYSTEM: &str = r#"You are ORYON Operator: a senior software architect and autonomous maintainer.
You receive:
- a task from a human
- optional repository context (file list and selected file contents)

You must output ONLY valid JSON with this schema:
{
  "summary": "what you will do",
  "branchName": "short-branch-name",
  "commitMessage": "...",
  "changes": [
    { "path": "relative/path.ext", "content": "FULL FILE CONTENT" }
  ],
  "notes": "risks, follow-ups"
}
Rules:
- changes[] MUST contain full file content, not diffs.
- Only edit files that are provided, unless you are explicitly asked to create new files; then you may add them.
- Keep modifications minimal.
- If you cannot proceed safely, output JSON with changes:[] and explain in notes.
"#;

/// A single file write; `content` is always the full file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,

    /// Commit message for this file; the plan's message is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A proposed repository change
///
/// `changes` is `None` when the model omitted it; the apply pipeline rejects
/// such plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Plan {
    pub summary: String,
    pub branch_name: String,
    pub commit_message: String,
    pub changes: Option<Vec<FileChange>>,
    pub notes: String,
}

impl Plan {
    /// Read a plan out of arbitrary JSON
    ///
    /// Only JSON well-formedness is required: fields of the wrong type are
    /// treated as missing.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let changes = value.get("changes").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .map(|item| FileChange {
                    path: item.get("path").and_then(Value::as_str).unwrap_or_default().to_string(),
                    content: item
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    message: item.get("message").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        });

        Plan {
            summary: text("summary"),
            branch_name: text("branchName"),
            commit_message: text("commitMessage"),
            changes,
            notes: text("notes"),
        }
    }

    /// Number of file changes (zero when `changes` is missing)
    pub fn change_count(&self) -> usize {
        self.changes.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Input for plan generation
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub task: String,
    pub repo_context: Option<String>,
    pub mode: Mode,
}

impl PlanRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_repo_context(mut self, context: impl Into<String>) -> Self {
        self.repo_context = Some(context.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// User prompt embedding the task and repository context
    pub fn user_prompt(&self) -> String {
        let context = self
            .repo_context
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("(none)");
        format!("TASK:\n{}\n\nREPO_CONTEXT:\n{}\n", self.task, context)
    }
}

/// Ask the model for a plan and extract it from the answer
pub async fn generate_plan(router: &ProviderRouter, request: &PlanRequest) -> Result<Plan> {
    info!(mode = ?request.mode, "Generating plan");

    let text = router
        .respond(PLAN_SYSTEM, &request.user_prompt(), request.mode)
        .await?;
    let plan = extract_plan(&text)?;

    debug!(changes = plan.change_count(), branch = %plan.branch_name, "Plan extracted");
    Ok(plan)
}

/// Extract and parse the JSON object that ends the model output
pub fn extract_plan(text: &str) -> Result<Plan> {
    let block = find_json_block(text).ok_or(Error::NoJson)?;
    let value: Value = serde_json::from_str(block)?;
    Ok(Plan::from_json(&value))
}

/// Locate the top-level `{...}` block that ends the text
///
/// Trailing whitespace and a closing code fence are ignored. Braces inside
/// JSON strings are skipped. When the braces do not balance, the slice from
/// the first `{` to the end is returned so the parser reports the problem.
pub fn find_json_block(text: &str) -> Option<&str> {
    let mut end = text.trim_end();
    if let Some(stripped) = end.strip_suffix("```") {
        end = stripped.trim_end();
    }
    if !end.ends_with('}') {
        return None;
    }

    let bytes = end.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 && i == bytes.len() - 1 {
                    return Some(&end[start..]);
                }
            }
            _ => {}
        }
    }

    end.find('{').map(|i| &end[i..])
}
