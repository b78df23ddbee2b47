//! Per-recipient cooldown for on-demand checks. In memory only.

use chrono::{DateTime, Duration, Utc};
use starwatch_core::traits::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct CooldownTable {
    window: Duration,
    clock: Arc<dyn Clock>,
    last_accepted: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTable {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Accept and record the request, or return how long the recipient must
    /// still wait. Rejected requests do not extend the window.
    pub fn try_acquire(&self, recipient: &str) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut table = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = table.get(recipient) {
            let elapsed = now - *last;
            if elapsed < self.window {
                return Err(self.window - elapsed);
            }
        }
        table.insert(recipient.to_string(), now);
        Ok(())
    }

    /// Drop entries whose window has passed.
    pub fn prune(&self) {
        let now = self.clock.now();
        let mut table = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());
        table.retain(|_, last| now - *last < self.window);
    }

    pub fn len(&self) -> usize {
        self.last_accepted.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
