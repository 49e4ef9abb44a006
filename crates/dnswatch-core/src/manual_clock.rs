//! A clock whose timers fire only on demand
//!
//! Every `sleep` call is handed to the test as a [`PendingTimer`]. Nothing
//! fires on its own, so backoff and rate-limit windows can be driven step by
//! step without real time passing.

use crate::traits::{Clock, Sleep};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Timer created by a [`ManualClock`], waiting to be fired
#[derive(Debug)]
pub struct PendingTimer {
    duration: Duration,
    fire: oneshot::Sender<()>,
}

impl PendingTimer {
    /// The duration the timer was created with
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Let the timer elapse now
    pub fn fire(self) {
        let _ = self.fire.send(());
    }
}

/// Clock that forwards every timer to a receiver
///
/// Dropping a [`PendingTimer`] without firing it leaves the sleeper pending
/// forever.
#[derive(Debug, Clone)]
pub struct ManualClock {
    timers: mpsc::UnboundedSender<PendingTimer>,
}

impl ManualClock {
    /// Create a clock and the receiver its timers arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingTimer>) {
        let (timers, rx) = mpsc::unbounded_channel();
        (Self { timers }, rx)
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> Sleep {
        let (fire, fired) = oneshot::channel();
        if self.timers.send(PendingTimer { duration, fire }).is_err() {
            return Box::pin(std::future::pending());
        }
        Box::pin(async move {
            if fired.await.is_err() {
                std::future::pending::<()>().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn fires_only_on_demand() {
        let (clock, mut timers) = ManualClock::new();
        let mut sleep = task::spawn(clock.sleep(Duration::from_secs(3)));
        assert_pending!(sleep.poll());

        let timer = timers.recv().await.unwrap();
        assert_eq!(timer.duration(), Duration::from_secs(3));
        assert_pending!(sleep.poll());

        timer.fire();
        assert!(sleep.is_woken());
        assert_ready!(sleep.poll());
    }

    #[tokio::test]
    async fn dropped_timer_never_fires() {
        let (clock, mut timers) = ManualClock::new();
        let mut sleep = task::spawn(clock.sleep(Duration::from_secs(1)));
        drop(timers.recv().await.unwrap());
        assert_pending!(sleep.poll());
    }
}
