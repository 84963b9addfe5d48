//! Config command - show resolved configuration

use clap::Args;
use oryon_core::{Config, ProviderKind, Secrets};
use std::path::{Path, PathBuf};

/// Show current configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Create a secrets template at ~/.config/oryon/secrets.toml
    #[arg(long)]
    init_secrets: bool,
}

impl ConfigArgs {
    pub fn execute(&self, config: &Config, secrets: &Secrets, config_path: Option<&Path>) -> anyhow::Result<()> {
        if self.init_secrets {
            let path = Secrets::create_template()?;
            println!("Created secrets template at {}", path.display());
            println!("Fill in your tokens; the file is readable only by you.");
            return Ok(());
        }

        println!("ORYON Configuration");
        println!("===================");
        println!();
        println!("Providers:");
        println!("  enabled: {}", config.providers.enabled.join(", "));
        println!("  primary: {}", config.providers.primary);
        for kind in ProviderKind::ALL {
            let settings = config.provider_settings(kind, secrets);
            println!(
                "  {}: model={} base_url={} key={}",
                kind,
                settings.model.as_deref().unwrap_or("(default)"),
                settings.base_url.as_deref().unwrap_or("(default)"),
                if settings.api_key.is_some() { "set" } else { "missing" }
            );
        }
        println!();
        println!("GitHub:");
        println!("  api_url: {}", config.github.api_url.as_deref().unwrap_or("(default)"));
        println!("  token: {}", if secrets.github_token().is_some() { "set" } else { "missing" });
        println!();
        println!("Server:");
        println!("  bind: {}:{}", config.server.bind, config.server.port);
        if let Some(dir) = &config.server.web_dir {
            println!("  web_dir: {}", dir.display());
        }
        println!();
        match &config.store.path {
            Some(path) => println!("State file: {}", path.display()),
            None => println!("State file: (default cache location)"),
        }
        println!();

        let path: Option<PathBuf> = config_path.map(Path::to_path_buf).or_else(Config::default_config_path);
        if let Some(path) = path {
            println!("Config file: {}", path.display());
            if path.exists() {
                println!("  (exists)");
            } else {
                println!("  (not found - using defaults)");
            }
        }
        if let Some(path) = Secrets::default_secrets_path() {
            println!("Secrets file: {}", path.display());
            if !path.exists() {
                println!("  (not found - run `oryon config --init-secrets`)");
            }
        }

        Ok(())
    }
}
