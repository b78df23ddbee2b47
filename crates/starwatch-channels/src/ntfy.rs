//! ntfy publisher — secondary push channel.
//!
//! Title, priority and tags travel as query parameters so non-ASCII titles
//! don't need header encoding.

use async_trait::async_trait;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{PublishOptions, TopicPublisher};
use std::time::Duration;

pub struct NtfyPublisher {
    server: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl NtfyPublisher {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.server.trim_end_matches('/'), topic.trim_start_matches('/'))
    }
}

#[async_trait]
impl TopicPublisher for NtfyPublisher {
    fn name(&self) -> &str { "ntfy" }

    async fn publish(&self, topic: &str, body: &str, options: &PublishOptions) -> Result<()> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(title) = &options.title {
            query.push(("title", title.clone()));
        }
        if let Some(priority) = options.priority {
            query.push(("priority", priority.to_string()));
        }
        if !options.tags.is_empty() {
            query.push(("tags", options.tags.join(",")));
        }

        let response = self
            .client
            .post(self.topic_url(topic))
            .timeout(self.timeout)
            .query(&query)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| StarwatchError::publish(format!("ntfy publish failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StarwatchError::publish(format!("ntfy {status}: {text}")));
        }
        Ok(())
    }
}
