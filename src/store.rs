//! State store: persistence of the project state document.
//!
//! One JSON file, read at the start of every run and replaced wholesale
//! at the end. The typed serde schema is the validation boundary: a file
//! that exists but fails to parse is a fatal read error, never treated as
//! "no state yet".

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::ProjectState;

/// Read/write contract for the persisted project state.
///
/// Absence is not an error: `read_state` returns `Ok(None)` on first run.
pub trait StateStore: Send + Sync {
    fn read_state(&self) -> Result<Option<ProjectState>>;
    fn write_state(&self, state: &ProjectState) -> Result<()>;
}

/// Filesystem-backed store: one pretty-printed JSON document.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn read_state(&self) -> Result<Option<ProjectState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: ProjectState = serde_json::from_str(&raw)
            .map_err(|e| Error::State(format!("{}: {e}", self.path.display())))?;
        Ok(Some(state))
    }

    fn write_state(&self, state: &ProjectState) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::State(format!("serialize: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<ProjectState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn read_state(&self) -> Result<Option<ProjectState>> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn write_state(&self, state: &ProjectState) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}
