//! Per-authority politeness pacing
//!
//! Enforces a minimum wall-clock gap between fetch starts against the same
//! authority within one job. State is owned by the job, not the process, so
//! two concurrent jobs pace independently.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct AuthorityPacer {
    delay: Duration,
    last_fetch: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl AuthorityPacer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_fetch: DashMap::new(),
        }
    }

    /// Wait until this authority may be fetched again, then claim the slot.
    ///
    /// The per-authority lock is held through the sleep, so concurrent
    /// workers targeting one authority line up behind each other and fetch
    /// starts stay at least `delay` apart.
    pub async fn wait(&self, authority: &str) {
        if self.delay.is_zero() {
            return;
        }
        let slot = self
            .last_fetch
            .entry(authority.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
