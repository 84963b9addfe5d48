//! Gemini generateContent binding

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::ProviderSettings;
use crate::{Error, Result};

use super::{base_url, send_json, Provider, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Provider backed by a Gemini-compatible `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    fn model(&self) -> &str {
        self.settings.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// `{base}/v1beta/models/{model}:generateContent?key={key}`
    fn endpoint(&self, api_key: &str) -> Result<Url> {
        let root = base_url(self.settings.base_url.as_deref(), DEFAULT_BASE_URL);
        let mut url = Url::parse(&root)
            .map_err(|e| Error::Config(format!("Invalid Gemini base URL '{}': {}", root, e)))?;

        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Gemini base URL cannot be a base: {}", root)))?
            .pop_if_empty()
            .extend(["v1beta", "models"])
            .push(&format!("{}:generateContent", self.model()));
        url.query_pairs_mut().append_pair("key", api_key);

        Ok(url)
    }
}

pub(crate) fn build_request(system: &str, user: &str) -> Value {
    let mut parts = Vec::new();
    if !system.is_empty() {
        parts.push(json!({ "text": format!("{}\n", system) }));
    }
    parts.push(json!({ "text": user }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "temperature": 0.2 }
    })
}

pub(crate) fn extract_text(body: &Value) -> String {
    let text: String = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        body.to_string()
    } else {
        text
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        ProviderKind::Gemini.as_str()
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn respond(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredential(ProviderKind::Gemini.key_env().to_string()))?;

        debug!(model = self.model(), "Calling Gemini");

        let request = self
            .http
            .post(self.endpoint(api_key)?)
            .json(&build_request(system, user));

        let body = send_json(request, ProviderKind::Gemini).await?;
        Ok(extract_text(&body))
    }
}
