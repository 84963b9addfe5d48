//! Single / ensemble routing across providers

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_PROVIDER};
use crate::secrets::Secrets;
use crate::{Error, Result};

use super::ProviderRegistry;

/// System prompt for merging ensemble answers
pub const SYNTHESIZE_SYSTEM: &str = "You are an expert software operator. Merge the following model outputs into one best answer. Keep it concise, actionable, and consistent.";

/// How a prompt is dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// First enabled provider only
    #[default]
    Single,
    /// All enabled providers in parallel, then a synthesis pass
    Ensemble,
}

impl Mode {
    /// Parse a mode from an untrusted request field; anything but "ensemble" is single
    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            Some("ensemble") => Mode::Ensemble,
            _ => Mode::Single,
        }
    }
}

/// One provider's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider: String,
    pub text: String,
}

/// Routes prompts over an ordered allow-list of providers
pub struct ProviderRouter {
    registry: ProviderRegistry,
    enabled: Vec<String>,
    primary: String,
}

impl ProviderRouter {
    /// Create a router; an empty allow-list falls back to the default provider
    ///
    /// Repeated names are dropped, so ensemble fan-out never exceeds the
    /// number of distinct providers.
    pub fn new(registry: ProviderRegistry, enabled: Vec<String>, primary: impl Into<String>) -> Self {
        let mut distinct: Vec<String> = Vec::with_capacity(enabled.len());
        for name in enabled {
            if !distinct.contains(&name) {
                distinct.push(name);
            }
        }
        let enabled = if distinct.is_empty() {
            vec![DEFAULT_PROVIDER.to_string()]
        } else {
            distinct
        };

        Self {
            registry,
            enabled,
            primary: primary.into(),
        }
    }

    /// Build the router with the built-in bindings
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        Self::new(
            ProviderRegistry::from_config(config, secrets),
            config.providers.enabled.clone(),
            config.providers.primary.clone(),
        )
    }

    /// Enabled providers, in routing order
    pub fn providers(&self) -> &[String] {
        &self.enabled
    }

    /// Provider preferred for synthesis
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Produce one answer for the prompt
    pub async fn respond(&self, system: &str, user: &str, mode: Mode) -> Result<String> {
        match mode {
            Mode::Single => {
                let first = &self.enabled[0];
                debug!(provider = %first, "Routing prompt (single)");
                self.call(first, system, user).await
            }
            Mode::Ensemble => self.ensemble(system, user).await,
        }
    }

    async fn call(&self, name: &str, system: &str, user: &str) -> Result<String> {
        self.registry.require(name)?.respond(system, user).await
    }

    async fn ensemble(&self, system: &str, user: &str) -> Result<String> {
        info!(providers = ?self.enabled, "Routing prompt (ensemble)");

        let results = join_all(
            self.enabled
                .iter()
                .map(|name| self.call(name, system, user)),
        )
        .await;

        let mut ok = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in self.enabled.iter().zip(results) {
            match result {
                Ok(text) => ok.push(ProviderResponse {
                    provider: name.clone(),
                    text,
                }),
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider failed");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if ok.is_empty() {
            return Err(Error::AllProvidersFailed(failures.join(" | ")));
        }

        let merged = merge_prompt(&ok);
        let synth = self.synthesis_provider(&ok);
        debug!(provider = %synth, succeeded = ok.len(), "Synthesizing ensemble answer");

        self.call(synth, SYNTHESIZE_SYSTEM, &merged).await
    }

    /// Primary provider when it has a credential, else the first success
    fn synthesis_provider<'a>(&'a self, ok: &'a [ProviderResponse]) -> &'a str {
        let primary_ready = self
            .registry
            .get(&self.primary)
            .map(|p| p.is_configured())
            .unwrap_or(false);

        if primary_ready {
            &self.primary
        } else {
            &ok[0].provider
        }
    }
}

/// Label each answer with its provider heading
fn merge_prompt(responses: &[ProviderResponse]) -> String {
    responses
        .iter()
        .map(|r| format!("### {}\n{}", r.provider.to_uppercase(), r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<(String, String, String)>>>;

    /// Provider that answers from a script and records every call
    struct FakeProvider {
        name: &'static str,
        configured: bool,
        answer: std::result::Result<String, String>,
        calls: CallLog,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn respond(&self, system: &str, user: &str) -> Result<String> {
            self.calls.lock().unwrap().push((
                self.name.to_string(),
                system.to_string(),
                user.to_string(),
            ));
            if system == SYNTHESIZE_SYSTEM {
                return Ok(format!("merged by {}", self.name));
            }
            self.answer.clone().map_err(Error::Provider)
        }
    }

    fn router(
        specs: &[(&'static str, bool, std::result::Result<&str, &str>)],
        primary: &str,
    ) -> (ProviderRouter, CallLog) {
        let calls: CallLog = Arc::default();
        let mut registry = ProviderRegistry::new();
        for &(name, configured, answer) in specs {
            registry.register(Box::new(FakeProvider {
                name,
                configured,
                answer: answer.map(str::to_string).map_err(str::to_string),
                calls: calls.clone(),
            }));
        }
        let enabled = specs.iter().map(|(n, _, _)| n.to_string()).collect();
        (ProviderRouter::new(registry, enabled, primary), calls)
    }

    #[test]
    fn test_mode_from_request() {
        assert_eq!(Mode::from_request(Some("ensemble")), Mode::Ensemble);
        assert_eq!(Mode::from_request(Some("single")), Mode::Single);
        assert_eq!(Mode::from_request(Some("bogus")), Mode::Single);
        assert_eq!(Mode::from_request(None), Mode::Single);
    }

    #[tokio::test]
    async fn test_single_calls_only_first() {
        let (router, calls) = router(
            &[("openai", true, Ok("A")), ("mistral", true, Ok("B"))],
            "openai",
        );

        let answer = router.respond("sys", "hi", Mode::Single).await.unwrap();
        assert_eq!(answer, "A");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "openai");
    }

    #[tokio::test]
    async fn test_single_failure_does_not_fall_back() {
        let (router, calls) = router(
            &[("openai", true, Err("quota exceeded")), ("mistral", true, Ok("B"))],
            "openai",
        );

        let err = router.respond("sys", "hi", Mode::Single).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_unknown_provider() {
        let router = ProviderRouter::new(ProviderRegistry::new(), vec!["llama".into()], "openai");
        let err = router.respond("s", "u", Mode::Single).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown provider: llama");
    }

    #[tokio::test]
    async fn test_ensemble_all_fail_lists_every_reason() {
        let (router, _) = router(
            &[
                ("openai", false, Err("OPENAI_API_KEY missing")),
                ("mistral", true, Err("Mistral error 500")),
                ("gemini", true, Err("bad request")),
            ],
            "openai",
        );

        let err = router.respond("s", "u", Mode::Ensemble).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "All providers failed: openai: OPENAI_API_KEY missing | mistral: Mistral error 500 | gemini: bad request"
        );
    }

    #[tokio::test]
    async fn test_ensemble_single_success_still_synthesizes() {
        let (router, calls) = router(
            &[
                ("openai", false, Err("OPENAI_API_KEY missing")),
                ("mistral", true, Err("Mistral error 502")),
                ("gemini", true, Ok("only me")),
            ],
            "openai",
        );

        let answer = router.respond("s", "u", Mode::Ensemble).await.unwrap();
        // primary has no credential, so the first success synthesizes
        assert_eq!(answer, "merged by gemini");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        let synth = calls.last().unwrap();
        assert_eq!(synth.0, "gemini");
        assert_eq!(synth.1, SYNTHESIZE_SYSTEM);
        assert_eq!(synth.2, "### GEMINI\nonly me");
    }

    #[tokio::test]
    async fn test_ensemble_prefers_configured_primary() {
        let (router, calls) = router(
            &[
                ("mistral", true, Ok("M")),
                ("openai", true, Err("OpenAI error 429")),
                ("gemini", true, Ok("G")),
            ],
            "openai",
        );

        let answer = router.respond("s", "u", Mode::Ensemble).await.unwrap();
        assert_eq!(answer, "merged by openai");

        let calls = calls.lock().unwrap();
        let synth = calls.last().unwrap();
        assert_eq!(synth.2, "### MISTRAL\nM\n\n### GEMINI\nG");
    }

    #[test]
    fn test_empty_allow_list_uses_default() {
        let router = ProviderRouter::new(ProviderRegistry::new(), Vec::new(), "openai");
        assert_eq!(router.providers(), ["openai".to_string()]);
    }

    #[test]
    fn test_repeated_providers_collapse() {
        let enabled = vec!["mistral".to_string(), "openai".to_string(), "mistral".to_string()];
        let router = ProviderRouter::new(ProviderRegistry::new(), enabled, "openai");
        assert_eq!(router.providers(), ["mistral".to_string(), "openai".to_string()]);
    }
}
