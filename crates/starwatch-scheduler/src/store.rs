//! State store — the single JSON record of the last successful check.

use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::types::PersistedState;
use std::path::{Path, PathBuf};

/// File-backed owner of the [`PersistedState`] record.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved state. Missing, empty, or unreadable records all mean
    /// "no prior state" and yield the default.
    pub fn load(&self) -> PersistedState {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PersistedState::default(),
            Err(e) => {
                tracing::warn!("Cannot read state {}: {e}; starting fresh", self.path.display());
                return PersistedState::default();
            }
        };

        if data.trim().is_empty() {
            return PersistedState::default();
        }

        serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!("Corrupt state {}: {e}; starting fresh", self.path.display());
            PersistedState::default()
        })
    }

    /// Replace the record. Written to a sibling temp file and renamed, so a
    /// crash mid-write never leaves a truncated record behind.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        write_json_atomic(&self.path, state)
    }
}

/// Serialize `value` to `path` via a temp file + rename.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StarwatchError::store(format!("rename {} failed: {e}", tmp.display()))
    })
}
