//! Mistral chat-completions binding

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderSettings;
use crate::{Error, Result};

use super::{base_url, send_json, Provider, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Provider backed by a Mistral-compatible `/v1/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct MistralProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl MistralProvider {
    pub fn new(http: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            base_url(self.settings.base_url.as_deref(), DEFAULT_BASE_URL)
        )
    }

    fn model(&self) -> &str {
        self.settings.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

pub(crate) fn build_request(model: &str, system: &str, user: &str) -> Value {
    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": user }));

    json!({ "model": model, "messages": messages, "temperature": 0.2 })
}

pub(crate) fn extract_text(body: &Value) -> String {
    match body.pointer("/choices/0/message/content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => body.to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl Provider for MistralProvider {
    fn name(&self) -> &str {
        ProviderKind::Mistral.as_str()
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn respond(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredential(ProviderKind::Mistral.key_env().to_string()))?;

        debug!(model = self.model(), "Calling Mistral");

        let request = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&build_request(self.model(), system, user));

        let body = send_json(request, ProviderKind::Mistral).await?;
        Ok(extract_text(&body))
    }
}
