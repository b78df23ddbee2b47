//! Chat commands understood by the bot.

use serde::{Deserialize, Serialize};

/// A request from a chat participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CheckStatus,
    Subscribe,
    Unsubscribe,
    Stats,
    Help,
}

impl Command {
    /// Parse a chat message such as `/star` or `/stats@MyBot extra`.
    /// Returns `None` for anything that is not a known command.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word).to_lowercase();

        match name.as_str() {
            "star" | "status" | "estado" => Some(Command::CheckStatus),
            "start" | "subscribe" | "alta" => Some(Command::Subscribe),
            "stop" | "unsubscribe" | "baja" => Some(Command::Unsubscribe),
            "stats" => Some(Command::Stats),
            "help" | "ayuda" => Some(Command::Help),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::CheckStatus => write!(f, "check-status"),
            Command::Subscribe => write!(f, "subscribe"),
            Command::Unsubscribe => write!(f, "unsubscribe"),
            Command::Stats => write!(f, "stats"),
            Command::Help => write!(f, "help"),
        }
    }
}
