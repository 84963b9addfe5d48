//! Configuration management for the ORYON operator
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (OPERATOR_*, <PROVIDER>_*, PORT, ...)
//! 3. Config file (~/.config/oryon/config.toml)
//! 4. Default values
//!
//! Credentials are not part of this file; see [`crate::secrets`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;
use crate::secrets::Secrets;
use crate::{Error, Result};

/// Provider used when no allow-list is configured
pub const DEFAULT_PROVIDER: &str = "openai";

/// Endpoint overrides for a single provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the provider API (provider default when unset)
    pub base_url: Option<String>,

    /// Model name (provider default when unset)
    pub model: Option<String>,
}

/// Provider routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Ordered allow-list of providers; the first one serves single mode
    pub enabled: Vec<String>,

    /// Provider preferred for ensemble synthesis when it has a credential
    pub primary: String,

    pub openai: EndpointConfig,
    pub mistral: EndpointConfig,
    pub gemini: EndpointConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: vec![DEFAULT_PROVIDER.to_string()],
            primary: DEFAULT_PROVIDER.to_string(),
            openai: EndpointConfig::default(),
            mistral: EndpointConfig::default(),
            gemini: EndpointConfig::default(),
        }
    }
}

impl ProvidersConfig {
    /// Endpoint overrides for a provider kind
    pub fn endpoint(&self, kind: ProviderKind) -> &EndpointConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Mistral => &self.mistral,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    fn endpoint_mut(&mut self, kind: ProviderKind) -> &mut EndpointConfig {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Mistral => &mut self.mistral,
            ProviderKind::Gemini => &mut self.gemini,
        }
    }
}

/// GitHub configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API base URL, for GitHub Enterprise installs
    pub api_url: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,

    /// Directory with the static web UI, served at `/`
    pub web_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8787,
            web_dir: None,
        }
    }
}

/// Run-log storage configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the state file (`~/.cache/oryon/state.json` when unset)
    pub path: Option<PathBuf>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub github: GitHubConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
}

/// Everything a provider binding needs to make a call
#[derive(Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/oryon/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("oryon").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - OPERATOR_PROVIDERS: comma-separated provider allow-list
    /// - OPERATOR_PRIMARY: synthesis provider for ensemble mode
    /// - OPENAI_BASE_URL, OPENAI_MODEL (and MISTRAL_*, GEMINI_*)
    /// - GITHUB_API_URL: GitHub API base URL
    /// - PORT: HTTP server port
    /// - ORYON_STATE_PATH: run-log state file
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("OPERATOR_PROVIDERS") {
            self.providers.enabled = parse_provider_list(&list);
        }

        if let Some(primary) = lookup("OPERATOR_PRIMARY") {
            let primary = primary.trim();
            if !primary.is_empty() {
                self.providers.primary = primary.to_string();
            }
        }

        for kind in ProviderKind::ALL {
            let prefix = kind.env_prefix();
            let endpoint = self.providers.endpoint_mut(kind);
            if let Some(url) = lookup(&format!("{}_BASE_URL", prefix)) {
                endpoint.base_url = Some(url);
            }
            if let Some(model) = lookup(&format!("{}_MODEL", prefix)) {
                endpoint.model = Some(model);
            }
        }

        if let Some(url) = lookup("GITHUB_API_URL") {
            self.github.api_url = Some(url);
        }

        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }

        if let Some(path) = lookup("ORYON_STATE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, providers: Option<String>, state_path: Option<PathBuf>) -> Self {
        if let Some(list) = providers {
            self.providers.enabled = parse_provider_list(&list);
        }

        if let Some(path) = state_path {
            self.store.path = Some(path);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        providers: Option<String>,
        state_path: Option<PathBuf>,
    ) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        Ok(base
            .with_env_overrides()
            .with_cli_overrides(providers, state_path))
    }

    /// Combine endpoint configuration with the credential for a provider
    pub fn provider_settings(&self, kind: ProviderKind, secrets: &Secrets) -> ProviderSettings {
        let endpoint = self.providers.endpoint(kind);
        ProviderSettings {
            api_key: secrets.provider_key(kind),
            base_url: endpoint.base_url.clone(),
            model: endpoint.model.clone(),
        }
    }
}

/// Parse a comma-separated provider list
///
/// Entries are trimmed and empty entries dropped. An empty result falls back
/// to the default provider.
pub fn parse_provider_list(list: &str) -> Vec<String> {
    let providers: Vec<String> = list
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if providers.is_empty() {
        vec![DEFAULT_PROVIDER.to_string()]
    } else {
        providers
    }
}
