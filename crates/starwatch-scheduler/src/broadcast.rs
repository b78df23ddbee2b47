//! Broadcast dispatcher — one notification to every subscriber, then a
//! best-effort copy to the secondary topic channel.

use starwatch_core::error::StarwatchError;
use starwatch_core::traits::{Messenger, PublishOptions, TopicPublisher};
use starwatch_core::types::Notification;
use std::sync::Arc;
use std::time::Duration;

use crate::compose::plain_text;
use crate::registry::SubscriberRegistry;

/// Topic publisher plus where and how to publish.
pub struct SecondaryChannel {
    pub publisher: Arc<dyn TopicPublisher>,
    pub topic: String,
    pub options: PublishOptions,
}

/// Per-recipient outcome of one broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, StarwatchError)>,
    /// `None` when no secondary channel is configured.
    pub secondary_ok: Option<bool>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct BroadcastDispatcher {
    messenger: Arc<dyn Messenger>,
    registry: Arc<SubscriberRegistry>,
    secondary: Option<SecondaryChannel>,
    send_timeout: Duration,
}

impl BroadcastDispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        registry: Arc<SubscriberRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            messenger,
            registry,
            secondary: None,
            send_timeout,
        }
    }

    pub fn with_secondary(mut self, secondary: SecondaryChannel) -> Self {
        self.secondary = Some(secondary);
        self
    }

    async fn deliver(&self, recipient: &str, notification: &Notification, with_image: bool) -> Result<(), StarwatchError> {
        let send = async {
            match (&notification.image, with_image) {
                (Some(image), true) => {
                    self.messenger
                        .send_image(recipient, image, &notification.text)
                        .await
                }
                _ => self.messenger.send_text(recipient, &notification.text).await,
            }
        };

        tokio::time::timeout(self.send_timeout, send)
            .await
            .map_err(|_| StarwatchError::timeout(format!("delivery to {recipient}")))?
    }

    /// Deliver to every current subscriber. Failures are per recipient and
    /// never stop the loop; the secondary channel never affects the result.
    pub async fn broadcast(&self, notification: &Notification) -> BroadcastReport {
        let with_image = match &notification.image {
            Some(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => true,
                _ => {
                    tracing::warn!("Image {} not readable, sending text only", path.display());
                    false
                }
            },
            None => false,
        };

        let recipients = self.registry.members();
        let mut report = BroadcastReport::default();

        for recipient in recipients {
            match self.deliver(&recipient, notification, with_image).await {
                Ok(()) => report.delivered.push(recipient),
                Err(e) => {
                    tracing::warn!("Delivery to {recipient} via {} failed: {e}", self.messenger.name());
                    report.failed.push((recipient, e));
                }
            }
        }

        tracing::info!(
            "Broadcast done: {} delivered, {} failed",
            report.delivered.len(),
            report.failed.len()
        );

        if let Some(secondary) = &self.secondary {
            report.secondary_ok = Some(self.publish_secondary(secondary, notification).await);
        }
        report
    }

    async fn publish_secondary(&self, secondary: &SecondaryChannel, notification: &Notification) -> bool {
        let body = plain_text(&notification.text);
        let publish = secondary
            .publisher
            .publish(&secondary.topic, &body, &secondary.options);

        match tokio::time::timeout(self.send_timeout, publish).await {
            Ok(Ok(())) => {
                tracing::debug!("Published to {} topic {}", secondary.publisher.name(), secondary.topic);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Secondary publish to {} failed: {e}", secondary.publisher.name());
                false
            }
            Err(_) => {
                tracing::warn!("Secondary publish to {} timed out", secondary.publisher.name());
                false
            }
        }
    }
}
