//! CLI command implementations

pub mod apply;
pub mod chat;
pub mod config;
pub mod plan;
pub mod runs;
pub mod serve;

pub use apply::ApplyArgs;
pub use chat::ChatArgs;
pub use config::ConfigArgs;
pub use plan::PlanArgs;
pub use runs::{RunsArgs, SettingsArgs};
pub use serve::ServeArgs;

use oryon_core::Mode;

/// Mode selected by an `--ensemble` flag
pub(crate) fn mode_flag(ensemble: bool) -> Mode {
    if ensemble {
        Mode::Ensemble
    } else {
        Mode::Single
    }
}

/// Open the run-log store named by the configuration
pub(crate) fn open_store(config: &oryon_core::Config) -> anyhow::Result<oryon_store::RunStore> {
    let store = match &config.store.path {
        Some(path) => oryon_store::RunStore::open(path)?,
        None => oryon_store::RunStore::open_default()?,
    };
    Ok(store)
}
