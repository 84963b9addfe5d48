//! Operator facade: runs each request and records it in the run-log

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use oryon_core::{Config, Mode, Plan, PlanRequest, ProviderRouter, Secrets};
use oryon_github::{ApplyOutcome, ApplyRequest};
use oryon_store::{PendingRun, RunKind, RunStore, Settings, SettingsPatch, State};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// GitHub credentials and endpoint handed to the apply pipeline
#[derive(Clone, Default)]
pub struct GitHubSettings {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("token", &self.token.is_some())
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Outcome of a recorded request
#[derive(Debug)]
pub struct Recorded<T> {
    /// Id of the stored run
    pub id: String,
    /// Value, or the human-readable error message
    pub result: Result<T, String>,
}

/// Chat, plan and apply with run-log bookkeeping
///
/// Store file I/O runs on the blocking thread pool.
pub struct Operator {
    router: ProviderRouter,
    store: Arc<RunStore>,
    github: GitHubSettings,
}

impl Operator {
    pub fn new(router: ProviderRouter, store: RunStore, github: GitHubSettings) -> Self {
        Self {
            router,
            store: Arc::new(store),
            github,
        }
    }

    /// Wire the operator from resolved configuration and secrets
    pub fn from_config(config: &Config, secrets: &Secrets) -> anyhow::Result<Self> {
        let path: PathBuf = match &config.store.path {
            Some(path) => path.clone(),
            None => RunStore::default_path()?,
        };
        let store = RunStore::open(&path)?;

        info!(
            providers = ?config.providers.enabled,
            state = %path.display(),
            "Operator ready"
        );

        Ok(Self::new(
            ProviderRouter::from_config(config, secrets),
            store,
            GitHubSettings {
                token: secrets.github_token(),
                api_url: config.github.api_url.clone(),
            },
        ))
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Full run-log document
    pub async fn run_log(&self) -> anyhow::Result<State> {
        self.with_store(|store| store.read()).await
    }

    pub async fn settings(&self) -> anyhow::Result<Settings> {
        self.with_store(|store| store.settings()).await
    }

    /// Apply a partial settings update
    pub async fn update_settings(&self, patch: SettingsPatch) -> anyhow::Result<Settings> {
        Ok(self.with_store(move |store| store.update_settings(patch)).await??)
    }

    /// Record a request refused before it ran as an error run
    pub async fn record_refusal(&self, kind: RunKind, input: Value, message: &str) -> String {
        let run = PendingRun::start(kind, input).fail(message);
        let id = run.id.clone();
        self.store_run(run).await;
        id
    }

    /// Chat without touching the run-log (WebSocket relay)
    pub async fn chat_unrecorded(&self, message: &str, mode: Mode) -> Result<String, String> {
        oryon_core::chat(&self.router, message, mode)
            .await
            .map_err(|e| e.to_string())
    }

    /// Answer a chat message
    pub async fn chat(&self, message: &str, mode: Mode) -> Recorded<String> {
        self.recorded(RunKind::Chat, json!(message), async {
            self.chat_unrecorded(message, mode).await
        })
        .await
    }

    /// Generate a change plan
    pub async fn plan(&self, request: &PlanRequest) -> Recorded<Plan> {
        self.recorded(RunKind::Plan, json!({ "task": request.task }), async {
            oryon_core::generate_plan(&self.router, request)
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Apply a plan to GitHub
    pub async fn apply(&self, request: &ApplyRequest) -> Recorded<ApplyOutcome> {
        let input = json!({ "repo": request.repo, "baseBranch": request.base_branch });
        self.recorded(RunKind::Apply, input, async {
            oryon_github::apply_to_github(
                request,
                self.github.token.as_deref(),
                self.github.api_url.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn recorded<T, F>(&self, kind: RunKind, input: Value, work: F) -> Recorded<T>
    where
        T: Serialize,
        F: Future<Output = Result<T, String>>,
    {
        let pending = PendingRun::start(kind, input);
        let id = pending.id().to_string();

        let result = work.await;

        let run = match &result {
            Ok(value) => pending.succeed(serde_json::to_value(value).unwrap_or(Value::Null)),
            Err(message) => {
                warn!(id = %id, kind = ?kind, error = %message, "Request failed");
                pending.fail(message.clone())
            }
        };

        self.store_run(run).await;

        Recorded { id, result }
    }

    async fn store_run(&self, run: oryon_store::Run) {
        let id = run.id.clone();
        match self.with_store(move |store| store.record(run)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(id = %id, error = %e, "Failed to record run"),
            Err(e) => warn!(id = %id, error = %e, "Run recording task failed"),
        }
    }

    async fn with_store<T, F>(&self, work: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RunStore) -> T + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || work(&store)).await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use oryon_core::{Provider, ProviderRegistry};
    use oryon_store::RunStatus;
    use tempfile::TempDir;

    /// Provider answering every prompt with the same text, or failing
    pub(crate) struct StaticProvider(pub Result<&'static str, &'static str>);

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &str {
            "openai"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn respond(&self, _system: &str, _user: &str) -> oryon_core::Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|e| oryon_core::Error::Provider(e.to_string()))
        }
    }

    pub(crate) fn operator(answer: Result<&'static str, &'static str>, dir: &TempDir) -> Operator {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(StaticProvider(answer)));
        Operator::new(
            ProviderRouter::new(registry, vec!["openai".into()], "openai"),
            RunStore::open(dir.path().join("state.json")).unwrap(),
            GitHubSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_chat_records_ok_run() {
        let dir = TempDir::new().unwrap();
        let operator = operator(Ok("pong"), &dir);

        let recorded = operator.chat("ping", Mode::Single).await;
        assert_eq!(recorded.result.as_deref(), Ok("pong"));

        let runs = operator.store().runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, recorded.id);
        assert_eq!(runs[0].kind, RunKind::Chat);
        assert_eq!(runs[0].status, RunStatus::Ok);
        assert_eq!(runs[0].input, json!("ping"));
        assert_eq!(runs[0].output, Some(json!("pong")));
    }

    #[tokio::test]
    async fn test_plan_failure_records_error_run() {
        let dir = TempDir::new().unwrap();
        let operator = operator(Ok("I cannot help with that."), &dir);

        let recorded = operator.plan(&PlanRequest::new("do it")).await;
        assert_eq!(recorded.result.unwrap_err(), "Model did not return JSON");

        let run = &operator.store().runs()[0];
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.input, json!({ "task": "do it" }));
        assert_eq!(run.error.as_deref(), Some("Model did not return JSON"));
    }

    #[tokio::test]
    async fn test_refusal_is_recorded_as_error_run() {
        let dir = TempDir::new().unwrap();
        let operator = operator(Ok("pong"), &dir);

        let id = operator
            .record_refusal(RunKind::Chat, Value::Null, "message missing")
            .await;

        let runs = operator.run_log().await.unwrap().runs;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, id);
        assert_eq!(runs[0].status, RunStatus::Error);
        assert_eq!(runs[0].error.as_deref(), Some("message missing"));
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_blocking_pool() {
        let dir = TempDir::new().unwrap();
        let operator = operator(Ok(""), &dir);

        let updated = operator
            .update_settings(SettingsPatch {
                default_repo: Some("octo/hello".into()),
                autopush: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.default_repo, "octo/hello");
        assert_eq!(operator.settings().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_apply_without_token_records_error() {
        let dir = TempDir::new().unwrap();
        let operator = operator(Ok(""), &dir);
        let plan = Plan {
            changes: Some(vec![]),
            ..Default::default()
        };

        let recorded = operator.apply(&ApplyRequest::new("octo/hello", plan)).await;
        assert_eq!(recorded.result.unwrap_err(), "GITHUB_TOKEN missing");

        let run = &operator.store().runs()[0];
        assert_eq!(run.kind, RunKind::Apply);
        assert_eq!(run.input["repo"], "octo/hello");
    }
}
