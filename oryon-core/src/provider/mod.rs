//! Language-model provider abstraction
//!
//! Each binding turns `(system, user)` into a single JSON POST against one
//! vendor API and normalizes the vendor's response shape into plain text.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::secrets::Secrets;
use crate::{Error, Result};

mod gemini;
mod mistral;
mod openai;
mod router;

pub use gemini::GeminiProvider;
pub use mistral::MistralProvider;
pub use openai::OpenAiProvider;
pub use router::{Mode, ProviderResponse, ProviderRouter, SYNTHESIZE_SYSTEM};

/// Trait for language-model backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name of this provider (e.g. "openai")
    fn name(&self) -> &str;

    /// Whether a credential is configured for this provider
    fn is_configured(&self) -> bool;

    /// Send a system + user prompt and return the answer as plain text
    async fn respond(&self, system: &str, user: &str) -> Result<String>;
}

/// Built-in provider bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Mistral,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Mistral,
        ProviderKind::Gemini,
    ];

    /// Registry name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Human label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Mistral => "Mistral",
            ProviderKind::Gemini => "Gemini",
        }
    }

    /// Prefix of the endpoint environment variables (`<PREFIX>_BASE_URL`, `<PREFIX>_MODEL`)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI",
            ProviderKind::Mistral => "MISTRAL",
            ProviderKind::Gemini => "GEMINI",
        }
    }

    /// Environment variable holding the API key
    pub fn key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Mistral => "MISTRAL_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "mistral" => Ok(ProviderKind::Mistral),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Registry of provider bindings, keyed by name
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Create a registry with every built-in binding, wired from configuration
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        let http = reqwest::Client::new();
        let mut registry = Self::new();
        registry.register(Box::new(OpenAiProvider::new(
            http.clone(),
            config.provider_settings(ProviderKind::OpenAi, secrets),
        )));
        registry.register(Box::new(MistralProvider::new(
            http.clone(),
            config.provider_settings(ProviderKind::Mistral, secrets),
        )));
        registry.register(Box::new(GeminiProvider::new(
            http,
            config.provider_settings(ProviderKind::Gemini, secrets),
        )));
        registry
    }

    /// Register a provider
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// Get a provider by name, failing on unknown names
    pub fn require(&self, name: &str) -> Result<&dyn Provider> {
        self.get(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    /// List all registered providers
    pub fn list_registered(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a trailing slash from a base URL, or fall back to the default
pub(crate) fn base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Send a prepared request and return the decoded JSON body
///
/// A body that is not JSON decodes to `{}`. Non-2xx responses become
/// [`Error::Provider`] carrying the upstream message when there is one.
pub(crate) async fn send_json(request: reqwest::RequestBuilder, kind: ProviderKind) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let json: Value = serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default()));

    if !status.is_success() {
        return Err(Error::Provider(error_message(&json, kind, status.as_u16())));
    }

    Ok(json)
}

/// Upstream `error.message`, or a generic `<Label> error <status>`
pub(crate) fn error_message(json: &Value, kind: ProviderKind, status: u16) -> String {
    json.pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} error {}", kind.label(), status))
}
