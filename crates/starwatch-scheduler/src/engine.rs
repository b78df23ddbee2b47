//! The check pipeline: fetch → diff → compose → broadcast → persist.

use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{Clock, SnapshotSource};
use starwatch_core::types::{ChangeEvent, PersistedState, Snapshot};
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::{BroadcastDispatcher, BroadcastReport};
use crate::compose::Composer;
use crate::detect::detect_change;
use crate::store::StateStore;

/// What a completed check did.
#[derive(Debug)]
pub enum CheckOutcome {
    /// The announcement is not on the listing; nothing was stored.
    NotFound,
    Checked {
        event: ChangeEvent,
        /// `None` when nothing was broadcast.
        broadcast: Option<BroadcastReport>,
    },
}

impl CheckOutcome {
    pub fn event(&self) -> Option<&ChangeEvent> {
        match self {
            CheckOutcome::Checked { event, .. } => Some(event),
            CheckOutcome::NotFound => None,
        }
    }
}

/// Runs full checks against the persisted state.
pub struct Monitor {
    source: Arc<dyn SnapshotSource>,
    store: StateStore,
    composer: Composer,
    dispatcher: BroadcastDispatcher,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: StateStore,
        composer: Composer,
        dispatcher: BroadcastDispatcher,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            composer,
            dispatcher,
            clock,
            fetch_timeout,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Fetch a snapshot, bounded by the fetch timeout.
    pub async fn fetch(&self) -> Result<Snapshot> {
        fetch_with_timeout(self.source.as_ref(), self.fetch_timeout).await
    }

    /// One full check. A fetch error aborts before any state is touched; a
    /// failed save is logged and does not fail the check.
    pub async fn run_check(&self) -> Result<CheckOutcome> {
        tracing::info!("Starting check via {}", self.source.name());

        let listing = match self.fetch().await {
            Ok(Snapshot::Found(listing)) => listing,
            Ok(Snapshot::NotFound) => {
                tracing::info!("Announcement not found on the listing");
                return Ok(CheckOutcome::NotFound);
            }
            Err(e) => {
                tracing::error!("Snapshot fetch failed: {e}");
                return Err(e);
            }
        };

        let previous = self.store.load();
        let event = detect_change(&previous, &listing);
        tracing::info!(
            "Marker prev={} now={}, event={}",
            previous.has_marker,
            listing.has_marker,
            event.kind()
        );

        let broadcast = match self.composer.compose(&event, &listing) {
            Some(notification) => Some(self.dispatcher.broadcast(&notification).await),
            None => None,
        };

        let next = PersistedState::from_listing(&listing, self.clock.now());
        if let Err(e) = self.store.save(&next) {
            tracing::error!("Failed to save state to {}: {e}", self.store.path().display());
        }

        Ok(CheckOutcome::Checked { event, broadcast })
    }
}

pub(crate) async fn fetch_with_timeout(source: &dyn SnapshotSource, timeout: Duration) -> Result<Snapshot> {
    tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| StarwatchError::timeout(format!("{} fetch after {}s", source.name(), timeout.as_secs())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandHandler, CommandReply, StatusReport};
    use crate::cooldown::CooldownTable;
    use crate::registry::SubscriberRegistry;
    use crate::testing::{FakeMessenger, FakeSource};
    use chrono::Utc;
    use starwatch_core::config::ListingConfig;
    use starwatch_core::traits::SystemClock;
    use starwatch_core::types::{Command, Document, Listing};

    struct Harness {
        _dir: tempfile::TempDir,
        source: Arc<FakeSource>,
        messenger: Arc<FakeMessenger>,
        monitor: Monitor,
    }

    fn harness(initial: Snapshot) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::returning(initial));
        let messenger = Arc::new(FakeMessenger::default());
        let registry = Arc::new(SubscriberRegistry::open(dir.path().join("subs.json"), "1"));
        let dispatcher = BroadcastDispatcher::new(messenger.clone(), registry, Duration::from_secs(1));
        let monitor = Monitor::new(
            source.clone(),
            StateStore::new(dir.path().join("state.json")),
            Composer::new(&ListingConfig::default()),
            dispatcher,
            Arc::new(SystemClock),
            Duration::from_secs(1),
        );
        Harness { _dir: dir, source, messenger, monitor }
    }

    fn doc(name: &str, url: &str) -> Document {
        Document::new("Listas", name, url, "")
    }

    #[tokio::test]
    async fn test_documents_example() {
        let h = harness(Snapshot::Found(Listing::with_documents(false, vec![doc("A", "urlA"), doc("B", "urlB")])));
        h.monitor.store().save(&PersistedState::from_listing(
            &Listing::with_documents(false, vec![doc("A", "urlA"), doc("B", "urlB")]),
            Utc::now(),
        )).unwrap();

        h.source.set(Snapshot::Found(Listing::with_documents(false, vec![doc("A", "urlA"), doc("C", "urlC")])));
        let outcome = h.monitor.run_check().await.unwrap();

        match outcome.event() {
            Some(ChangeEvent::DocumentsChanged { added, removed }) => {
                assert_eq!(added, &vec![doc("C", "urlC")]);
                assert_eq!(removed, &vec![doc("B", "urlB")]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let stored = h.monitor.store().load();
        let urls: Vec<&str> = stored.documents.keys().map(String::as_str).collect();
        assert_eq!(urls, vec!["urlA", "urlC"]);
        assert_eq!(h.messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_check_is_silent() {
        let h = harness(Snapshot::Found(Listing::free_text(true, "CONVOCATORIA")));

        let first = h.monitor.run_check().await.unwrap();
        assert_eq!(first.event(), Some(&ChangeEvent::MarkerRaised));
        assert_eq!(h.messenger.sent().len(), 1);

        let second = h.monitor.run_check().await.unwrap();
        assert_eq!(second.event(), Some(&ChangeEvent::NoChange));
        assert!(matches!(second, CheckOutcome::Checked { broadcast: None, .. }));
        assert_eq!(h.messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_marker_edge_broadcasts_once() {
        let docs = vec![doc("A", "urlA")];
        let h = harness(Snapshot::Found(Listing::with_documents(false, docs.clone())));
        h.monitor.run_check().await.unwrap();
        let baseline = h.messenger.sent().len();

        h.source.set(Snapshot::Found(Listing::with_documents(true, docs.clone())));
        let outcome = h.monitor.run_check().await.unwrap();
        assert_eq!(outcome.event(), Some(&ChangeEvent::MarkerRaised));
        assert_eq!(h.messenger.sent().len(), baseline + 1);

        let outcome = h.monitor.run_check().await.unwrap();
        assert_eq!(outcome.event(), Some(&ChangeEvent::NoChange));
        assert!(h.monitor.store().load().has_marker);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_state_untouched() {
        let h = harness(Snapshot::Found(Listing::free_text(true, "texto")));
        h.monitor.run_check().await.unwrap();
        let before = h.monitor.store().load();

        h.source.fail("net::ERR_TIMED_OUT");
        assert!(h.monitor.run_check().await.is_err());
        assert_eq!(h.monitor.store().load(), before);
    }

    #[tokio::test]
    async fn test_not_found_leaves_state_untouched() {
        let h = harness(Snapshot::NotFound);
        let outcome = h.monitor.run_check().await.unwrap();
        assert!(matches!(outcome, CheckOutcome::NotFound));
        assert!(!h.monitor.store().path().exists());
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_an_error() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let source = FakeSource::gated(Snapshot::NotFound, gate);
        let err = fetch_with_timeout(&source, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, StarwatchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_fail_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::returning(Snapshot::Found(Listing::free_text(true, "x"))));
        let registry = Arc::new(SubscriberRegistry::open(dir.path().join("subs.json"), "1"));
        let messenger = Arc::new(FakeMessenger::failing_for(&["1"]));
        let monitor = Monitor::new(
            source,
            StateStore::new(dir.path().join("state.json")),
            Composer::new(&ListingConfig::default()),
            BroadcastDispatcher::new(messenger, registry, Duration::from_secs(1)),
            Arc::new(SystemClock),
            Duration::from_secs(1),
        );

        let outcome = monitor.run_check().await.unwrap();
        let CheckOutcome::Checked { broadcast: Some(report), .. } = outcome else {
            panic!("expected a broadcast");
        };
        assert_eq!(report.failed.len(), 1);
        assert!(monitor.store().load().has_marker);
    }

    fn monitor_on(dir: &tempfile::TempDir, source: Arc<FakeSource>) -> Monitor {
        let registry = Arc::new(SubscriberRegistry::open(dir.path().join("subs.json"), "1"));
        Monitor::new(
            source,
            StateStore::new(dir.path().join("state.json")),
            Composer::new(&ListingConfig::default()),
            BroadcastDispatcher::new(Arc::new(FakeMessenger::default()), registry, Duration::from_secs(1)),
            Arc::new(SystemClock),
            Duration::from_secs(5),
        )
    }

    async fn wait_for_fetch(source: &FakeSource) {
        for _ in 0..100 {
            if source.fetches() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetch never started");
    }

    #[tokio::test]
    async fn test_status_query_runs_during_scheduled_check() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let scheduled_source = Arc::new(FakeSource::gated(
            Snapshot::Found(Listing::free_text(true, "programada")),
            gate.clone(),
        ));
        let monitor = Arc::new(monitor_on(&dir, scheduled_source.clone()));

        let check = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run_check().await })
        };
        wait_for_fetch(&scheduled_source).await;

        let live_source = Arc::new(FakeSource::returning(Snapshot::Found(Listing::free_text(false, "en vivo"))));
        let handler = CommandHandler::new(
            live_source.clone(),
            Arc::new(SubscriberRegistry::open(dir.path().join("subs.json"), "1")),
            CooldownTable::new(chrono::Duration::seconds(60), Arc::new(SystemClock)),
            Duration::from_secs(1),
        );
        let reply = tokio::time::timeout(Duration::from_secs(1), handler.handle("42", Command::CheckStatus))
            .await
            .expect("status must not wait for the scheduled check");
        assert!(matches!(reply, CommandReply::Status(StatusReport { has_marker: false, .. })));
        assert_eq!(live_source.fetches(), 1);
        assert!(!monitor.store().path().exists());

        gate.notify_one();
        check.await.unwrap().unwrap();
        let stored = monitor.store().load();
        assert!(stored.has_marker);
        assert_eq!(stored.summary_text, "programada");
    }

    #[tokio::test]
    async fn test_later_save_wins_between_monitors() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let slow_source = Arc::new(FakeSource::gated(
            Snapshot::Found(Listing::free_text(false, "lento")),
            gate.clone(),
        ));
        let slow = Arc::new(monitor_on(&dir, slow_source.clone()));
        let fast = monitor_on(
            &dir,
            Arc::new(FakeSource::returning(Snapshot::Found(Listing::free_text(true, "rapido")))),
        );

        let slow_check = {
            let slow = slow.clone();
            tokio::spawn(async move { slow.run_check().await })
        };
        wait_for_fetch(&slow_source).await;

        fast.run_check().await.unwrap();
        assert_eq!(fast.store().load().summary_text, "rapido");

        gate.notify_one();
        slow_check.await.unwrap().unwrap();

        let stored = fast.store().load();
        assert_eq!(stored.summary_text, "lento");
        assert!(!stored.has_marker);
    }
}
