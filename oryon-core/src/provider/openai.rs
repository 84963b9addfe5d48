//! OpenAI responses API binding

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderSettings;
use crate::{Error, Result};

use super::{base_url, send_json, Provider, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Provider backed by an OpenAI-compatible `/v1/responses` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub fn new(http: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/responses",
            base_url(self.settings.base_url.as_deref(), DEFAULT_BASE_URL)
        )
    }

    fn model(&self) -> &str {
        self.settings.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Build the request body
pub(crate) fn build_request(model: &str, system: &str, user: &str) -> Value {
    let mut input = Vec::new();
    if !system.is_empty() {
        input.push(json!({ "role": "system", "content": system }));
    }
    input.push(json!({ "role": "user", "content": user }));

    json!({ "model": model, "input": input })
}

/// Collect the answer text from the response shapes the API produces
pub(crate) fn extract_text(body: &Value) -> String {
    let parts: Vec<&str> = body
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|c| matches!(c.get("type").and_then(Value::as_str), Some("output_text" | "text")))
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect();

    if !parts.is_empty() {
        return parts.join("\n");
    }

    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    body.to_string()
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        ProviderKind::OpenAi.as_str()
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn respond(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredential(ProviderKind::OpenAi.key_env().to_string()))?;

        debug!(model = self.model(), "Calling OpenAI");

        let request = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&build_request(self.model(), system, user));

        let body = send_json(request, ProviderKind::OpenAi).await?;
        Ok(extract_text(&body))
    }
}
