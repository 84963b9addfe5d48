//! Serve command - run the HTTP and WebSocket API

use clap::Args;
use oryon_core::{Config, Secrets};
use oryon_serve::{Operator, ServeConfig};
use std::path::PathBuf;

/// Run the HTTP and WebSocket server
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Static web client directory (overrides config)
    #[arg(long)]
    web_dir: Option<PathBuf>,

    /// Build identifier reported by /api/health
    #[arg(long, env = "BUILD_ID")]
    build_id: Option<String>,
}

impl ServeArgs {
    pub async fn execute(self, config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
        let operator = Operator::from_config(config, secrets)?;

        let serve_config = ServeConfig {
            bind: self.bind.unwrap_or_else(|| config.server.bind.clone()),
            port: self.port.unwrap_or(config.server.port),
            web_dir: self.web_dir.or_else(|| config.server.web_dir.clone()),
            build_id: self.build_id,
        };

        oryon_serve::serve(operator, serve_config).await
    }
}
