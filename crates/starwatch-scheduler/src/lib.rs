//! # Starwatch Scheduler
//!
//! The change-detection and notification engine.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval, single-flight)      CommandHandler (/star, /subscribe, ...)
//!   └── Monitor::run_check                          ├── CooldownTable (per recipient)
//!         ├── SnapshotSource::fetch                 ├── SnapshotSource::fetch (live, no state)
//!         ├── StateStore::load                      └── SubscriberRegistry add/remove/count
//!         ├── detect::detect_change
//!         ├── Composer::compose
//!         ├── BroadcastDispatcher::broadcast
//!         │     ├── Messenger (every subscriber)
//!         │     └── TopicPublisher (best effort)
//!         └── StateStore::save
//! ```

pub mod broadcast;
pub mod commands;
pub mod compose;
pub mod cooldown;
pub mod detect;
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{BroadcastDispatcher, BroadcastReport, SecondaryChannel};
pub use commands::{CommandHandler, CommandReply, StatusReport};
pub use compose::Composer;
pub use cooldown::CooldownTable;
pub use detect::detect_change;
pub use engine::{CheckOutcome, Monitor};
pub use registry::{RemoveOutcome, SubscribeOutcome, SubscriberRegistry};
pub use scheduler::{Scheduler, TickOutcome};
pub use store::StateStore;
