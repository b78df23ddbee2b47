//! Domain types shared across Starwatch crates.

pub mod command;
pub mod event;
pub mod snapshot;
pub mod state;

pub use command::Command;
pub use event::{ChangeEvent, Notification};
pub use snapshot::{Document, Listing, Snapshot, TrackedContent};
pub use state::PersistedState;
