//! In-memory fakes for the core traits, shared by the unit tests.

use async_trait::async_trait;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{Messenger, PublishOptions, SnapshotSource, TopicPublisher};
use starwatch_core::types::Snapshot;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub recipient: String,
    pub text: String,
    pub image: Option<PathBuf>,
}

#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<Sent>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl FakeMessenger {
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    async fn record(&self, recipient: &str, text: &str, image: Option<&Path>) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(recipient) {
            return Err(StarwatchError::RecipientUnreachable(format!("{recipient} blocked the bot")));
        }
        self.sent.lock().unwrap().push(Sent {
            recipient: recipient.to_string(),
            text: text.to_string(),
            image: image.map(Path::to_path_buf),
        });
        Ok(())
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn name(&self) -> &str { "fake" }

    async fn send_text(&self, recipient: &str, message: &str) -> Result<()> {
        self.record(recipient, message, None).await
    }

    async fn send_image(&self, recipient: &str, image: &Path, caption: &str) -> Result<()> {
        self.record(recipient, caption, Some(image)).await
    }
}

#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl FakePublisher {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicPublisher for FakePublisher {
    fn name(&self) -> &str { "fake-topic" }

    async fn publish(&self, topic: &str, body: &str, _options: &PublishOptions) -> Result<()> {
        if self.fail {
            return Err(StarwatchError::publish("topic server down"));
        }
        self.published.lock().unwrap().push((topic.to_string(), body.to_string()));
        Ok(())
    }
}

enum Scripted {
    Snapshot(Snapshot),
    Fail(String),
    Panic,
}

/// Snapshot source returning whatever it was last told to.
pub struct FakeSource {
    next: Mutex<Scripted>,
    fetches: AtomicUsize,
    gate: Option<std::sync::Arc<Notify>>,
}

impl FakeSource {
    pub fn returning(snapshot: Snapshot) -> Self {
        Self {
            next: Mutex::new(Scripted::Snapshot(snapshot)),
            fetches: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        let source = Self::returning(Snapshot::NotFound);
        *source.next.lock().unwrap() = Scripted::Fail(msg.to_string());
        source
    }

    pub fn panicking() -> Self {
        let source = Self::returning(Snapshot::NotFound);
        *source.next.lock().unwrap() = Scripted::Panic;
        source
    }

    /// Every fetch waits for one `notify_one` on `gate` before answering.
    pub fn gated(snapshot: Snapshot, gate: std::sync::Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::returning(snapshot)
        }
    }

    pub fn set(&self, snapshot: Snapshot) {
        *self.next.lock().unwrap() = Scripted::Snapshot(snapshot);
    }

    pub fn fail(&self, msg: &str) {
        *self.next.lock().unwrap() = Scripted::Fail(msg.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    fn name(&self) -> &str { "fake-source" }

    async fn fetch(&self) -> Result<Snapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.next.lock().unwrap();
        match &*next {
            Scripted::Snapshot(snapshot) => Ok(snapshot.clone()),
            Scripted::Fail(msg) => Err(StarwatchError::fetch(msg.clone())),
            Scripted::Panic => panic!("extractor crashed"),
        }
    }
}
