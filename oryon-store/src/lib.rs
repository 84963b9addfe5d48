//! Run-log storage for the ORYON operator
//!
//! A single JSON document `{ runs, settings }` rewritten whole on every
//! update. Runs are kept most-recent-first and capped at [`MAX_RUNS`].
//!
//! Read-modify-write is serialized inside one process. Several processes
//! sharing a state file can still race; the file is a single-writer log.

pub mod error;
pub mod models;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

pub use error::{Error, Result};
pub use models::{PendingRun, Run, RunKind, RunStatus, Settings, SettingsPatch, State};

/// Maximum number of runs retained
pub const MAX_RUNS: usize = 200;

/// JSON file store for runs and settings
#[derive(Debug)]
pub struct RunStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RunStore {
    /// Open a store, creating the parent directory and a default file if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        if !store.path.exists() {
            debug!(path = %store.path.display(), "Creating run-log state file");
            store.write(&State::default())?;
        }

        Ok(store)
    }

    /// Get the default state path (~/.cache/oryon/state.json)
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Path("Could not determine cache directory".to_string()))?;
        Ok(cache_dir.join("oryon").join("state.json"))
    }

    /// Open the store at the default path
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current state
    ///
    /// An unreadable or corrupt file yields the default state.
    pub fn read(&self) -> State {
        match std::fs::read_to_string(&self.path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(Error::from))
        {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read state, using defaults");
                State::default()
            }
        }
    }

    /// Replace the whole state file
    ///
    /// Writes to a sibling temp file and renames it over the target.
    pub fn write(&self, state: &State) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read, mutate and write back the state
    pub fn update<F>(&self, mutate: F) -> Result<State>
    where
        F: FnOnce(&mut State),
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut state = self.read();
        mutate(&mut state);
        self.write(&state)?;
        Ok(state)
    }

    /// Record a finished run at the front of the log
    pub fn record(&self, run: Run) -> Result<()> {
        debug!(id = %run.id, kind = ?run.kind, status = ?run.status, "Recording run");
        self.update(|state| {
            state.runs.insert(0, run);
            state.runs.truncate(MAX_RUNS);
        })?;
        Ok(())
    }

    /// Recorded runs, most recent first
    pub fn runs(&self) -> Vec<Run> {
        self.read().runs
    }

    pub fn settings(&self) -> Settings {
        self.read().settings
    }

    /// Apply a partial settings update and return the new settings
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let state = self.update(|state| patch.apply(&mut state.settings))?;
        Ok(state.settings)
    }
}
