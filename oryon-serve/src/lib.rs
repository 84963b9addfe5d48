//! HTTP and WebSocket API for the ORYON operator

pub mod operator;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use oryon_core::{Mode, Plan, PlanRequest};
use oryon_github::ApplyRequest;
use oryon_store::{RunKind, SettingsPatch, State as RunLog};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

pub use operator::{GitHubSettings, Operator, Recorded};

/// Maximum accepted request body
pub const BODY_LIMIT: usize = 5 * 1024 * 1024;

// ── Config ──

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    /// Static web client served at `/`
    pub web_dir: Option<PathBuf>,
    /// Reported by `/api/health`
    pub build_id: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8787,
            web_dir: None,
            build_id: None,
        }
    }
}

// ── App State ──

pub(crate) struct AppState {
    pub(crate) operator: Operator,
    build_id: Option<String>,
}

// ── Error Handling ──

enum AppError {
    BadRequest(&'static str),
    /// Body that is not JSON or does not fit the request shape
    Rejected(JsonRejection),
    Internal(anyhow::Error),
}

impl AppError {
    fn message(&self) -> String {
        match self {
            AppError::BadRequest(message) => message.to_string(),
            AppError::Rejected(rejection) => rejection.body_text(),
            AppError::Internal(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(rejection) => rejection.status(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl<T> Recorded<T> {
    fn into_api(self) -> Result<(String, T), AppError> {
        match self.result {
            Ok(value) => Ok((self.id, value)),
            Err(message) => Err(AppError::Internal(anyhow::anyhow!(message))),
        }
    }
}

impl AppState {
    /// Record a request refused before it ran, then hand back its error
    async fn refuse(&self, kind: RunKind, input: Value, err: AppError) -> AppError {
        self.operator.record_refusal(kind, input, &err.message()).await;
        err
    }
}

// ── Entrypoint ──

pub async fn serve(operator: Operator, config: ServeConfig) -> anyhow::Result<()> {
    let app = router(operator, &config);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "ORYON operator listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(operator: Operator, config: &ServeConfig) -> Router {
    let state = Arc::new(AppState {
        operator,
        build_id: config.build_id.clone(),
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/supervision", get(get_supervision))
        .route("/api/settings", post(post_settings))
        .route("/api/chat", post(post_chat))
        .route("/api/ops/plan", post(post_plan))
        .route("/api/ops/apply", post(post_apply))
        .route("/ws", get(ws::upgrade))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state);

    match &config.web_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            app.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => app,
    }
}

// ── Health ──

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "ok": true,
        "time": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "build": state.build_id,
    }))
}

// ── GET /api/supervision ──

async fn get_supervision(State(state): State<Arc<AppState>>) -> Result<Json<RunLog>, AppError> {
    Ok(Json(state.operator.run_log().await?))
}

// ── POST /api/settings ──

#[derive(Serialize)]
struct SettingsResponse {
    settings: oryon_store::Settings,
}

async fn post_settings(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SettingsResponse>, AppError> {
    let Json(body) = body.map_err(AppError::Rejected)?;
    // fields of the wrong type are ignored
    let patch = SettingsPatch {
        default_repo: body.get("defaultRepo").and_then(Value::as_str).map(str::to_string),
        autopush: body.get("autopush").and_then(Value::as_bool),
    };
    let settings = state.operator.update_settings(patch).await?;
    Ok(Json(SettingsResponse { settings }))
}

// ── POST /api/chat ──

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    id: String,
    reply: String,
}

async fn post_chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return Err(state
                .refuse(RunKind::Chat, Value::Null, AppError::Rejected(rejection))
                .await)
        }
    };
    let Some(message) = body.message.filter(|m| !m.is_empty()) else {
        return Err(state
            .refuse(RunKind::Chat, Value::Null, AppError::BadRequest("message missing"))
            .await);
    };
    let mode = Mode::from_request(body.mode.as_deref());

    let (id, reply) = state.operator.chat(&message, mode).await.into_api()?;
    Ok(Json(ChatResponse { id, reply }))
}

// ── POST /api/ops/plan ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanBody {
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    repo_context: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
struct PlanResponse {
    id: String,
    plan: Plan,
}

async fn post_plan(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PlanBody>, JsonRejection>,
) -> Result<Json<PlanResponse>, AppError> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return Err(state
                .refuse(RunKind::Plan, Value::Null, AppError::Rejected(rejection))
                .await)
        }
    };
    let Some(task) = body.task.filter(|t| !t.is_empty()) else {
        let input = serde_json::json!({ "task": null });
        return Err(state
            .refuse(RunKind::Plan, input, AppError::BadRequest("task missing"))
            .await);
    };

    let mut request = PlanRequest::new(task).with_mode(Mode::from_request(body.mode.as_deref()));
    if let Some(context) = body.repo_context.filter(|c| !c.is_empty()) {
        request = request.with_repo_context(context);
    }

    let (id, plan) = state.operator.plan(&request).await.into_api()?;
    Ok(Json(PlanResponse { id, plan }))
}

// ── POST /api/ops/apply ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyBody {
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    base_branch: Option<String>,
    #[serde(default)]
    plan: Option<Value>,
    #[serde(default, rename = "openPR")]
    open_pr: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyResponse {
    id: String,
    branch_name: String,
    pr_url: Option<String>,
}

async fn post_apply(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ApplyBody>, JsonRejection>,
) -> Result<Json<ApplyResponse>, AppError> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return Err(state
                .refuse(RunKind::Apply, Value::Null, AppError::Rejected(rejection))
                .await)
        }
    };

    let repo = match body.repo.filter(|r| !r.is_empty()) {
        Some(repo) => repo,
        None => state.operator.settings().await?.default_repo,
    };
    let input = serde_json::json!({ "repo": repo, "baseBranch": body.base_branch });
    if repo.is_empty() {
        return Err(state
            .refuse(RunKind::Apply, input, AppError::BadRequest("repo missing"))
            .await);
    }

    let Some(plan) = body
        .plan
        .as_ref()
        .map(Plan::from_json)
        .filter(|plan| plan.changes.is_some())
    else {
        return Err(state
            .refuse(RunKind::Apply, input, AppError::BadRequest("plan missing/invalid"))
            .await);
    };

    let request = ApplyRequest {
        repo,
        base_branch: body.base_branch,
        plan,
        open_pr: body.open_pr.unwrap_or(true),
    };

    let (id, outcome) = state.operator.apply(&request).await.into_api()?;
    Ok(Json(ApplyResponse {
        id,
        branch_name: outcome.branch_name,
        pr_url: outcome.pr_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::tests::operator;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(answer: Result<&'static str, &'static str>, dir: &TempDir) -> Router {
        let config = ServeConfig {
            build_id: Some("test-build".into()),
            ..Default::default()
        };
        router(operator(answer, dir), &config)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        post_raw(app, uri, &body.to_string()).await
    }

    async fn post_raw(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_returns_ok_and_build() {
        let dir = TempDir::new().unwrap();
        let (status, json) = get_json(app(Ok(""), &dir), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["build"], "test-build");
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn chat_returns_reply_and_records_run() {
        let dir = TempDir::new().unwrap();
        let app = app(Ok("pong"), &dir);

        let (status, json) = post_json(app.clone(), "/api/chat", json!({ "message": "ping" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reply"], "pong");

        let (_, supervision) = get_json(app, "/api/supervision").await;
        let runs = supervision["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["id"], json["id"]);
        assert_eq!(runs[0]["type"], "chat");
        assert_eq!(runs[0]["status"], "ok");
    }

    #[tokio::test]
    async fn chat_without_message_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_json(app(Ok("pong"), &dir), "/api/chat", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "message missing");
    }

    #[tokio::test]
    async fn chat_provider_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_json(
            app(Err("OPENAI_API_KEY missing"), &dir),
            "/api/chat",
            json!({ "message": "ping" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "OPENAI_API_KEY missing");
    }

    #[tokio::test]
    async fn plan_returns_parsed_plan() {
        let dir = TempDir::new().unwrap();
        let answer = r#"{"summary":"s","branchName":"oryon/x","commitMessage":"c","changes":[],"notes":""}"#;
        let (status, json) = post_json(app(Ok(answer), &dir), "/api/ops/plan", json!({ "task": "t" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["plan"]["branchName"], "oryon/x");
        assert_eq!(json["plan"]["changes"], json!([]));
    }

    #[tokio::test]
    async fn plan_without_task_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_json(app(Ok(""), &dir), "/api/ops/plan", json!({ "task": "" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "task missing");
    }

    #[tokio::test]
    async fn apply_without_repo_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_json(
            app(Ok(""), &dir),
            "/api/ops/apply",
            json!({ "plan": { "changes": [] } }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "repo missing");
    }

    #[tokio::test]
    async fn apply_without_changes_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_json(
            app(Ok(""), &dir),
            "/api/ops/apply",
            json!({ "repo": "octo/hello", "plan": { "summary": "no changes" } }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "plan missing/invalid");
    }

    #[tokio::test]
    async fn apply_uses_default_repo_and_records_failure() {
        let dir = TempDir::new().unwrap();
        let app = app(Ok(""), &dir);

        post_json(app.clone(), "/api/settings", json!({ "defaultRepo": "octo/hello" })).await;

        // no GitHub token configured
        let (status, json) = post_json(
            app.clone(),
            "/api/ops/apply",
            json!({ "plan": { "changes": [{ "path": "README.md", "content": "hi" }] } }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "GITHUB_TOKEN missing");

        let (_, supervision) = get_json(app, "/api/supervision").await;
        let run = &supervision["runs"][0];
        assert_eq!(run["type"], "apply");
        assert_eq!(run["status"], "error");
        assert_eq!(run["input"]["repo"], "octo/hello");
    }

    #[tokio::test]
    async fn settings_patch_ignores_wrong_types() {
        let dir = TempDir::new().unwrap();
        let app = app(Ok(""), &dir);

        let (status, json) = post_json(
            app.clone(),
            "/api/settings",
            json!({ "defaultRepo": "octo/hello", "autopush": "yes" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["settings"]["defaultRepo"], "octo/hello");
        assert_eq!(json["settings"]["autopush"], false);

        let (_, json) = post_json(app, "/api/settings", json!({ "autopush": true })).await;
        assert_eq!(json["settings"]["defaultRepo"], "octo/hello");
        assert_eq!(json["settings"]["autopush"], true);
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let dir = TempDir::new().unwrap();
        let (status, json) = post_raw(app(Ok("pong"), &dir), "/api/chat", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrongly_typed_field_gets_json_error() {
        let dir = TempDir::new().unwrap();
        let app = app(Ok("pong"), &dir);

        let (status, json) = post_json(app.clone(), "/api/chat", json!({ "message": 5 })).await;
        assert!(status.is_client_error());
        assert!(json["error"].as_str().unwrap().contains("message"));

        let (status, json) = post_json(
            app,
            "/api/ops/apply",
            json!({ "repo": "octo/hello", "plan": { "changes": [] }, "openPR": "yes" }),
        )
        .await;
        assert!(status.is_client_error());
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn refused_requests_are_recorded() {
        let dir = TempDir::new().unwrap();
        let app = app(Ok("pong"), &dir);

        post_json(app.clone(), "/api/chat", json!({})).await;
        post_json(app.clone(), "/api/ops/plan", json!({})).await;
        post_json(app.clone(), "/api/ops/apply", json!({ "repo": "octo/hello" })).await;

        let (_, supervision) = get_json(app, "/api/supervision").await;
        let runs = supervision["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 3);

        assert_eq!(runs[0]["type"], "apply");
        assert_eq!(runs[0]["error"], "plan missing/invalid");
        assert_eq!(runs[0]["input"]["repo"], "octo/hello");
        assert_eq!(runs[1]["type"], "plan");
        assert_eq!(runs[1]["error"], "task missing");
        assert_eq!(runs[2]["type"], "chat");
        assert_eq!(runs[2]["error"], "message missing");
        assert!(runs.iter().all(|run| run["status"] == "error"));
    }
}
