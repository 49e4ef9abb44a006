//! Rate limiter for explicit re-resolution requests
//!
//! A single pending-trigger slot: the first request after the slot was
//! consumed is admitted and wakes the watcher, everything else until the
//! watcher consumes it is coalesced. The watcher consumes the slot only after
//! the minimum interval since its last successful cycle has passed, so a
//! burst of requests costs at most one extra cycle per window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Single-slot trigger with a minimum interval
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    pending: AtomicBool,
    notify: Notify,
}

impl RateLimiter {
    /// Create a limiter; a zero interval disables throttling
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            pending: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// The window enforced between explicitly triggered cycles
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Request a trigger; `false` means it was folded into a pending one
    ///
    /// Never blocks.
    pub fn admit(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_one();
        true
    }

    /// Whether an admitted trigger has not been consumed yet
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until a trigger has been admitted
    ///
    /// Returns immediately if one was admitted while nobody was waiting.
    pub async fn triggered(&self) {
        self.notify.notified().await;
    }

    /// Free the slot; the next `admit` is accepted again
    pub fn consume(&self) {
        self.pending.store(false, Ordering::Release);
    }
}
