//! Snapshot source trait — produces a structured read of the listing.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Snapshot;

/// Produces a [`Snapshot`] for the current check.
///
/// Implementations must not touch shared state; the engine decides what
/// to persist. An `Err` means the read failed (navigation error, bad
/// output), which is distinct from `Ok(Snapshot::NotFound)`.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Snapshot>;
}
