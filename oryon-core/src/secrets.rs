//! Secrets management for the ORYON operator
//!
//! Secrets are stored separately from configuration to avoid accidental sharing.
//! The secrets file is located at `~/.config/oryon/secrets.toml` and must have
//! restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variables (GITHUB_TOKEN, OPENAI_API_KEY, MISTRAL_API_KEY, GEMINI_API_KEY)
//! 2. Secrets file (~/.config/oryon/secrets.toml)
//!
//! Secrets are resolved once at startup and handed to the components that
//! need them; nothing downstream reads the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::ProviderKind;
use crate::{Error, Result};

/// Secrets structure
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// GitHub configuration
    pub github: GitHubSecrets,

    /// Language-model provider keys
    pub providers: ProviderSecrets,
}

/// GitHub-related secrets
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// GitHub Personal Access Token
    pub token: Option<String>,
}

/// Provider API keys
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSecrets {
    pub openai_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| v.is_some();
        f.debug_struct("Secrets")
            .field("github_token", &set(&self.github.token))
            .field("openai_api_key", &set(&self.providers.openai_api_key))
            .field("mistral_api_key", &set(&self.providers.mistral_api_key))
            .field("gemini_api_key", &set(&self.providers.gemini_api_key))
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from the default location and apply environment overrides
    pub fn load_with_env() -> Result<Self> {
        Ok(Self::load()?.with_env_overrides())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path).map_err(Error::Io)?;
            let mode = metadata.permissions().mode();

            // Check if file is readable by group or others (mode & 0o077)
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        for value in secrets.values_mut() {
            *value = normalize(value.take());
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/oryon/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("oryon").join("secrets.toml"))
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Non-empty variables win over values from the secrets file.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = normalize(lookup("GITHUB_TOKEN")) {
            debug!("Using GitHub token from GITHUB_TOKEN environment variable");
            self.github.token = Some(token);
        }

        for kind in ProviderKind::ALL {
            let var = kind.key_env();
            if let Some(key) = normalize(lookup(var)) {
                debug!(provider = kind.as_str(), "Using API key from {} environment variable", var);
                *self.provider_key_mut(kind) = Some(key);
            }
        }

        self
    }

    /// Get the GitHub token
    pub fn github_token(&self) -> Option<String> {
        self.github.token.clone()
    }

    /// Get the API key for a provider
    pub fn provider_key(&self, kind: ProviderKind) -> Option<String> {
        match kind {
            ProviderKind::OpenAi => self.providers.openai_api_key.clone(),
            ProviderKind::Mistral => self.providers.mistral_api_key.clone(),
            ProviderKind::Gemini => self.providers.gemini_api_key.clone(),
        }
    }

    fn provider_key_mut(&mut self, kind: ProviderKind) -> &mut Option<String> {
        match kind {
            ProviderKind::OpenAi => &mut self.providers.openai_api_key,
            ProviderKind::Mistral => &mut self.providers.mistral_api_key,
            ProviderKind::Gemini => &mut self.providers.gemini_api_key,
        }
    }

    fn values_mut(&mut self) -> [&mut Option<String>; 4] {
        [
            &mut self.github.token,
            &mut self.providers.openai_api_key,
            &mut self.providers.mistral_api_key,
            &mut self.providers.gemini_api_key,
        ]
    }

    /// Create a template secrets file at the default location
    ///
    /// Creates parent directories if needed and sets secure permissions
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        // Don't overwrite existing file
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# ORYON Operator secrets
# This file contains sensitive credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)

[github]
# GitHub Personal Access Token (contents + pull requests write access)
token = ""

[providers]
openai_api_key = ""
mistral_api_key = ""
gemini_api_key = ""
"#;

        std::fs::write(&path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your tokens");

        Ok(path)
    }
}

/// Trim a secret and drop it when empty
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_secrets() {
        let secrets = Secrets::default();
        assert!(secrets.github.token.is_none());
        assert!(secrets.provider_key(ProviderKind::OpenAi).is_none());
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[github]
token = "ghp_xxxxxxxxxxxx"

[providers]
gemini_api_key = "g-key"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.github_token(), Some("ghp_xxxxxxxxxxxx".to_string()));
        assert_eq!(secrets.provider_key(ProviderKind::Gemini), Some("g-key".to_string()));
        assert!(secrets.provider_key(ProviderKind::Mistral).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"test\"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o644);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let result = Secrets::load_from_file(file.path());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted_and_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[github]\ntoken = \"  ghp_test  \"\n[providers]\nopenai_api_key = \"\""
        )
        .unwrap();

        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.github_token(), Some("ghp_test".to_string()));
        // empty strings count as unset
        assert!(secrets.provider_key(ProviderKind::OpenAi).is_none());
    }

    #[test]
    fn test_env_overrides_win() {
        let secrets = Secrets {
            github: GitHubSecrets {
                token: Some("from_file".to_string()),
            },
            providers: ProviderSecrets {
                mistral_api_key: Some("file-mistral".to_string()),
                ..Default::default()
            },
        };

        let secrets = secrets.with_overrides_from(|k| match k {
            "GITHUB_TOKEN" => Some(" from_env ".to_string()),
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "MISTRAL_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(secrets.github_token(), Some("from_env".to_string()));
        assert_eq!(secrets.provider_key(ProviderKind::OpenAi), Some("sk-env".to_string()));
        // blank env var does not clobber the file value
        assert_eq!(
            secrets.provider_key(ProviderKind::Mistral),
            Some("file-mistral".to_string())
        );
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets = Secrets::default().with_overrides_from(|k| {
            (k == "GITHUB_TOKEN").then(|| "ghp_secret".to_string())
        });
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("github_token: true"));
    }
}
