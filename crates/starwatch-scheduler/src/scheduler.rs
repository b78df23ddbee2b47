//! Interval scheduler with single-flight protection.
//!
//! A tick that arrives while a check is still running is dropped, not
//! queued. The running flag is reset by a drop guard, so errors and panics
//! inside the pipeline always return the scheduler to idle.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{CheckOutcome, Monitor};

/// What happened to a tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// A check was started; the handle resolves when it finishes.
    Started(JoinHandle<()>),
    /// A check was already running.
    Skipped,
}

/// Resets the running flag however the check ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    monitor: Arc<Monitor>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a check unless one is already in flight.
    pub fn tick(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Check still running, skipping this tick");
            return TickOutcome::Skipped;
        }

        let guard = RunningGuard(self.running.clone());
        let monitor = self.monitor.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(monitor.run_check()).catch_unwind().await {
                Ok(Ok(CheckOutcome::NotFound)) => tracing::info!("Scheduled check done: not found"),
                Ok(Ok(CheckOutcome::Checked { event, broadcast })) => tracing::info!(
                    "Scheduled check done: {} ({} recipients)",
                    event.kind(),
                    broadcast.map(|r| r.attempted()).unwrap_or(0)
                ),
                Ok(Err(e)) => tracing::error!("Scheduled check failed: {e}"),
                Err(_) => tracing::error!("Scheduled check panicked"),
            }
        });
        TickOutcome::Started(handle)
    }

    /// Tick immediately, then every interval, until `shutdown` flips to true.
    /// A check still in flight at shutdown is awaited before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Scheduler started, checking every {}s", self.interval.as_secs());

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let TickOutcome::Started(handle) = self.tick() {
                        in_flight = Some(handle);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight.filter(|h| !h.is_finished()) {
            tracing::info!("Waiting for the running check to finish");
            if let Err(e) = handle.await {
                tracing::error!("Check task failed during shutdown: {e}");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}
