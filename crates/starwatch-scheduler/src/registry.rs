//! Subscriber registry — who receives broadcasts.
//!
//! The administrative recipient is always a member and can never be removed.
//! The JSON record is re-read before every operation and rewritten after every
//! mutation, so a running bot and the `subscribers` CLI see each other's
//! changes. While the record is missing or unreadable the in-memory set is used.

use serde::Deserialize;
use starwatch_core::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::store::write_json_atomic;

/// Result of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

/// Result of an unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotSubscribed,
    /// The administrative recipient cannot leave.
    NotPermitted,
}

/// Ids may have been written as JSON numbers by older tooling.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredId {
    Text(String),
    Number(i64),
}

impl From<StoredId> for String {
    fn from(id: StoredId) -> Self {
        match id {
            StoredId::Text(s) => s,
            StoredId::Number(n) => n.to_string(),
        }
    }
}

pub struct SubscriberRegistry {
    path: PathBuf,
    admin: String,
    members: Mutex<BTreeSet<String>>,
}

impl SubscriberRegistry {
    /// Load the record at `path`. Missing or unreadable records give `{admin}`.
    pub fn open(path: impl Into<PathBuf>, admin: impl Into<String>) -> Self {
        let path = path.into();
        let admin = admin.into();
        let mut members = Self::read_record(&path).unwrap_or_default();
        members.insert(admin.clone());

        tracing::debug!("Subscriber registry {} loaded ({} members)", path.display(), members.len());
        Self {
            path,
            admin,
            members: Mutex::new(members),
        }
    }

    /// Members on disk, or `None` when the record is missing or unreadable.
    fn read_record(path: &Path) -> Option<BTreeSet<String>> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Cannot read subscribers {}: {e}", path.display());
                }
                return None;
            }
        };

        match serde_json::from_str::<Vec<StoredId>>(&data) {
            Ok(ids) => Some(
                ids.into_iter()
                    .map(String::from)
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("Corrupt subscribers {}: {e}", path.display());
                None
            }
        }
    }

    /// Lock the set after refreshing it from the record on disk.
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        let mut members = self.members.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut on_disk) = Self::read_record(&self.path) {
            on_disk.insert(self.admin.clone());
            *members = on_disk;
        }
        members
    }

    fn persist(&self, members: &BTreeSet<String>) {
        if let Err(e) = write_json_atomic(&self.path, members) {
            tracing::warn!("Failed to persist subscribers to {}: {e}", self.path.display());
        }
    }

    pub fn is_admin(&self, id: &str) -> bool {
        self.admin == id
    }

    pub fn add(&self, id: &str) -> SubscribeOutcome {
        let mut members = self.lock();
        if !members.insert(id.to_string()) {
            return SubscribeOutcome::AlreadySubscribed;
        }
        self.persist(&members);
        tracing::info!("Subscriber added: {id} (total {})", members.len());
        SubscribeOutcome::Added
    }

    pub fn remove(&self, id: &str) -> RemoveOutcome {
        if self.is_admin(id) {
            return RemoveOutcome::NotPermitted;
        }
        let mut members = self.lock();
        if !members.remove(id) {
            return RemoveOutcome::NotSubscribed;
        }
        self.persist(&members);
        tracing::info!("Subscriber removed: {id} (total {})", members.len());
        RemoveOutcome::Removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of the current members, admin included.
    pub fn members(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Write the current set even if nothing changed (e.g. first start).
    pub fn flush(&self) -> Result<()> {
        let members = self.lock();
        write_json_atomic(&self.path, &*members)
    }
}
