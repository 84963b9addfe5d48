//! Chat command - one message through the provider router

use clap::Args;
use oryon_core::{Config, Secrets};
use oryon_serve::Operator;

use super::mode_flag;

/// Send one chat message
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send
    message: String,

    /// Ask every enabled provider and merge the answers
    #[arg(long)]
    ensemble: bool,
}

impl ChatArgs {
    pub async fn execute(&self, config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
        let operator = Operator::from_config(config, secrets)?;

        let recorded = operator.chat(&self.message, mode_flag(self.ensemble)).await;
        let reply = recorded.result.map_err(anyhow::Error::msg)?;

        println!("{}", reply);
        Ok(())
    }
}
