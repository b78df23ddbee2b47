//! Telegram Bot API channel — HTML messages, photo uploads, long polling.
//!
//! Uses the plain REST endpoints (`sendMessage`, `sendPhoto`, `getUpdates`);
//! no webhook server is needed.

use async_trait::async_trait;
use serde::Deserialize;
use starwatch_core::config::TelegramConfig;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::Messenger;
use std::path::Path;
use std::time::Duration;

/// Telegram rejects message texts above this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;
/// Telegram rejects photo captions above this many characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

/// An update from `getUpdates`. Only message updates are requested.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
}

impl TelegramMessage {
    /// Recipient identifier used by the subscriber registry.
    pub fn chat_id(&self) -> String {
        self.chat.id.to_string()
    }

    pub fn sender_label(&self) -> String {
        self.from
            .as_ref()
            .and_then(|u| u.username.clone())
            .unwrap_or_else(|| self.chat_id())
    }
}

/// Telegram bot channel.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    send_timeout: Duration,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig, send_timeout: Duration) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            send_timeout,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| StarwatchError::channel(format!("Telegram {method}: invalid response ({status}): {e}")))?;

        if body.ok {
            return body
                .result
                .ok_or_else(|| StarwatchError::channel(format!("Telegram {method}: empty result")));
        }

        let description = body.description.unwrap_or_else(|| status.to_string());
        match body.error_code {
            // Bot blocked, kicked, or chat gone.
            Some(400 | 403) if is_unreachable(&description) => {
                Err(StarwatchError::RecipientUnreachable(description))
            }
            Some(code) => Err(StarwatchError::channel(format!("Telegram {method} {code}: {description}"))),
            None => Err(StarwatchError::channel(format!("Telegram {method}: {description}"))),
        }
    }

    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(self.send_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| StarwatchError::channel(format!("Telegram sendMessage failed: {e}")))?;

        Self::read_response::<serde_json::Value>("sendMessage", response).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: &str, image: &Path, caption: Option<&str>) -> Result<()> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.png".into());

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(caption) = caption {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", "HTML");
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .timeout(self.send_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StarwatchError::channel(format!("Telegram sendPhoto failed: {e}")))?;

        Self::read_response::<serde_json::Value>("sendPhoto", response).await?;
        Ok(())
    }

    /// Discard updates that queued up while the bot was offline.
    pub async fn drop_pending_updates(&self) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("deleteWebhook"))
            .timeout(self.send_timeout)
            .json(&serde_json::json!({ "drop_pending_updates": true }))
            .send()
            .await
            .map_err(|e| StarwatchError::channel(format!("Telegram deleteWebhook failed: {e}")))?;

        Self::read_response::<bool>("deleteWebhook", response).await?;
        Ok(())
    }

    /// Long-poll for new message updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let poll = self.config.poll_timeout_seconds;
        let body = serde_json::json!({
            "offset": offset,
            "timeout": poll,
            "allowed_updates": ["message"],
        });

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(poll) + self.send_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| StarwatchError::channel(format!("Telegram getUpdates failed: {e}")))?;

        Self::read_response("getUpdates", response).await
    }
}

#[async_trait]
impl Messenger for TelegramChannel {
    fn name(&self) -> &str { "telegram" }

    async fn send_text(&self, recipient: &str, message: &str) -> Result<()> {
        for chunk in split_message(message, MAX_MESSAGE_CHARS) {
            self.send_message_chunk(recipient, &chunk).await?;
        }
        Ok(())
    }

    async fn send_image(&self, recipient: &str, image: &Path, caption: &str) -> Result<()> {
        if caption.chars().count() <= MAX_CAPTION_CHARS {
            return self.send_photo(recipient, image, Some(caption)).await;
        }
        self.send_photo(recipient, image, None).await?;
        self.send_text(recipient, caption).await
    }
}

fn is_unreachable(description: &str) -> bool {
    ["blocked", "kicked", "chat not found", "deactivated"]
        .iter()
        .any(|needle| description.contains(needle))
}

/// Split `text` into chunks of at most `max_chars`, breaking on line
/// boundaries so HTML tags opened on a line are closed in the same chunk.
/// A single line longer than the limit is cut hard.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::new(
            TelegramConfig {
                bot_token: "123:abc".into(),
                admin_chat_id: "1".into(),
                api_base: server.uri(),
                poll_timeout_seconds: 0,
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hola", 10), vec!["hola".to_string()]);
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_message(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_split_long_line_is_cut() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn test_send_text_posts_html_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "parse_mode": "HTML",
                "text": "<b>hola</b>",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server).send_text("42", "<b>hola</b>").await.unwrap();
    }

    #[tokio::test]
    async fn test_blocked_recipient_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let err = channel(&server).send_text("42", "hola").await.unwrap_err();
        assert!(matches!(err, StarwatchError::RecipientUnreachable(_)));
    }

    #[tokio::test]
    async fn test_send_image_uploads_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("latest_update.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

        channel(&server).send_image("42", &image, "caption").await.unwrap();
    }

    #[tokio::test]
    async fn test_long_caption_falls_back_to_text() {
        let server = MockServer::start().await;
        let ok = serde_json::json!({ "ok": true, "result": { "message_id": 3 } });
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shot.png");
        std::fs::write(&image, b"png").unwrap();

        let caption = "x".repeat(MAX_CAPTION_CHARS + 1);
        channel(&server).send_image("42", &image, &caption).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_updates_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 5,
                            "chat": { "id": 42, "type": "private" },
                            "from": { "id": 42, "is_bot": false, "username": "ana" },
                            "text": "/star"
                        }
                    },
                    { "update_id": 11 }
                ]
            })))
            .mount(&server)
            .await;

        let updates = channel(&server).get_updates(0).await.unwrap();
        assert_eq!(updates.len(), 2);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.chat_id(), "42");
        assert_eq!(msg.sender_label(), "ana");
        assert_eq!(msg.text.as_deref(), Some("/star"));
        assert!(updates[1].message.is_none());
    }
}
