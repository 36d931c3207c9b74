//! Persisted controller state
//!
//! State survives controller restarts: the memoized workload kind and what was
//! last applied to the workload container. Writes are incremental so a crash
//! mid-pass leaves the store consistent with the last completed step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_common::Error;

use crate::workload::WorkloadKind;

/// What the reconciler last applied to the workload container
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppliedState {
    /// Environment the running service was last started with
    #[serde(default)]
    pub current_environment: BTreeMap<String, String>,
    /// SHA-256 (hex) of the last content pushed to each file path
    #[serde(default)]
    pub rendered_file_hashes: BTreeMap<String, String>,
}

/// Everything the controller persists between passes
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoredState {
    /// Memoized classification; `None` until the descriptor has been read
    #[serde(default)]
    pub workload_kind: Option<WorkloadKind>,
    /// Applied environment and file hashes
    #[serde(default)]
    pub applied: AppliedState,
}

/// Storage for [`StoredState`]
pub trait StateStore: Send {
    /// Read the persisted state; a store that was never written yields the default
    fn load(&self) -> Result<StoredState, Error>;

    /// Replace the persisted state
    fn save(&mut self, state: &StoredState) -> Result<(), Error>;
}

/// Process-local store
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: StoredState,
    saves: usize,
}

impl MemoryStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `state`
    pub fn seeded(state: StoredState) -> Self {
        Self { state, saves: 0 }
    }

    /// Last saved state
    pub fn state(&self) -> &StoredState {
        &self.state
    }

    /// Number of saves so far
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<StoredState, Error> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &StoredState) -> Result<(), Error> {
        self.state = state.clone();
        self.saves += 1;
        Ok(())
    }
}

/// Store backed by a JSON file
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// reader never observes a partial document.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<StoredState, Error> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(StoredState::default());
            }
            Err(e) => {
                return Err(Error::store(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            Error::store(format!("corrupt state file {}: {}", self.path.display(), e))
        })
    }

    fn save(&mut self, state: &StoredState) -> Result<(), Error> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| Error::store(format!("cannot encode state: {}", e)))?;

        let temp = self.temp_path();
        std::fs::write(&temp, content)
            .map_err(|e| Error::store(format!("cannot write {}: {}", temp.display(), e)))?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            Error::store(format!(
                "cannot move {} to {}: {}",
                temp.display(),
                self.path.display(),
                e
            ))
        })
    }
}
