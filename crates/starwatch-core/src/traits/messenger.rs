//! Messaging transports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Primary transport: direct delivery to a single recipient.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    /// Send an HTML-formatted text message.
    async fn send_text(&self, recipient: &str, message: &str) -> Result<()>;

    /// Send an image from disk with an HTML caption.
    async fn send_image(&self, recipient: &str, image: &Path, caption: &str) -> Result<()>;
}

/// Options for a topic publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishOptions {
    pub title: Option<String>,
    /// 1 (min) to 5 (max); `None` leaves the server default.
    pub priority: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Secondary transport: fire-and-forget publish to a topic.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, topic: &str, body: &str, options: &PublishOptions) -> Result<()>;
}
