//! # Starwatch Channels
//! Adapters for the outside world: the Telegram Bot API (primary delivery and
//! command intake), an ntfy topic publisher (secondary push), and the
//! extractor process that reads the listing.

pub mod extractor;
pub mod ntfy;
pub mod telegram;

pub use extractor::ExtractorSource;
pub use ntfy::NtfyPublisher;
pub use telegram::{TelegramChannel, TelegramMessage, TelegramUpdate};
