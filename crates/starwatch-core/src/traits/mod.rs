//! Seams between the engine and the outside world.

pub mod clock;
pub mod messenger;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use messenger::{Messenger, PublishOptions, TopicPublisher};
pub use source::SnapshotSource;
