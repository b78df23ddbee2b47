//! Telegram command loop.
//!
//! Long-polls `getUpdates` and answers each recognised command in its own
//! task, so a slow status check never blocks other chats.

use starwatch_channels::{TelegramChannel, TelegramUpdate};
use starwatch_core::traits::Messenger;
use starwatch_core::types::Command;
use starwatch_scheduler::CommandHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const CHECKING_TEXT: &str = "Comprobando estado actual de la web... ⏳";

const INITIAL_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 60;

pub struct CommandLoop {
    telegram: Arc<TelegramChannel>,
    handler: Arc<CommandHandler>,
}

/// A command addressed to the bot, with the chat it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub chat_id: String,
    pub sender: String,
    pub command: Command,
}

/// Extract a command from an update; anything else is ignored.
pub fn incoming(update: &TelegramUpdate) -> Option<Incoming> {
    let message = update.message.as_ref()?;
    let command = Command::parse(message.text.as_deref()?)?;
    Some(Incoming {
        chat_id: message.chat_id(),
        sender: message.sender_label(),
        command,
    })
}

/// Offset acknowledging every update up to and including `updates`.
pub fn next_offset(current: i64, updates: &[TelegramUpdate]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(current, |next| next.max(current))
}

impl CommandLoop {
    pub fn new(telegram: Arc<TelegramChannel>, handler: Arc<CommandHandler>) -> Self {
        Self { telegram, handler }
    }

    /// Poll until `shutdown` flips to true. Poll errors back off from 5s,
    /// doubling up to 60s.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.telegram.drop_pending_updates().await {
            tracing::warn!("Could not drop pending updates: {e}");
        }
        tracing::info!("Telegram command loop started");

        let mut offset = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            let updates = tokio::select! {
                result = self.telegram.get_updates(offset) => result,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            match updates {
                Ok(updates) => {
                    backoff_secs = INITIAL_BACKOFF_SECS;
                    offset = next_offset(offset, &updates);
                    for update in &updates {
                        if let Some(incoming) = incoming(update) {
                            self.spawn_reply(incoming);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("getUpdates failed: {e}, retrying in {backoff_secs}s...");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                        _ = shutdown.changed() => {}
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                }
            }
        }
        tracing::info!("Telegram command loop stopped");
    }

    fn spawn_reply(&self, incoming: Incoming) {
        let telegram = self.telegram.clone();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            tracing::info!("{} from {} ({})", incoming.command, incoming.sender, incoming.chat_id);
            let chat = incoming.chat_id.as_str();
            let ack_channel = telegram.clone();
            let reply = handler
                .handle_with_ack(chat, incoming.command, move || async move {
                    if let Err(e) = ack_channel.send_text(chat, CHECKING_TEXT).await {
                        tracing::warn!("Ack to {chat} failed: {e}");
                    }
                })
                .await;
            if let Err(e) = telegram.send_text(chat, &reply.text()).await {
                tracing::warn!("Reply to {chat} failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: i64, text: Option<&str>) -> TelegramUpdate {
        serde_json::from_value(serde_json::json!({
            "update_id": id,
            "message": {
                "message_id": 1,
                "chat": { "id": 555 },
                "from": { "id": 555, "username": "ana" },
                "text": text,
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_incoming_parses_commands() {
        let got = incoming(&update(1, Some("/star@StarBot"))).unwrap();
        assert_eq!(got.chat_id, "555");
        assert_eq!(got.sender, "ana");
        assert_eq!(got.command, Command::CheckStatus);
    }

    #[test]
    fn test_incoming_ignores_chatter() {
        assert!(incoming(&update(1, Some("hola"))).is_none());
        assert!(incoming(&update(1, None)).is_none());

        let no_message: TelegramUpdate = serde_json::from_value(serde_json::json!({ "update_id": 9 })).unwrap();
        assert!(incoming(&no_message).is_none());
    }

    #[test]
    fn test_next_offset() {
        assert_eq!(next_offset(0, &[]), 0);
        assert_eq!(next_offset(0, &[update(10, None), update(12, None)]), 13);
        assert_eq!(next_offset(20, &[update(12, None)]), 20);
    }
}
