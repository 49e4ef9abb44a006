// # Clock Trait
//
// Timer construction for the watcher loop. Production uses tokio timers;
// tests inject a `ManualClock` whose timers fire only when told to.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A pending timer
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait for timer sources
pub trait Clock: Send + Sync {
    /// A future completing once `duration` has elapsed
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}
