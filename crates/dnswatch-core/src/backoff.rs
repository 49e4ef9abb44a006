//! Backoff controller
//!
//! Bounded exponential schedule: the first wait after a failed cycle is the
//! base delay, each further consecutive failure multiplies it, and no wait
//! exceeds the cap. An accepted cycle resets the schedule.

use crate::config::BackoffConfig;
use std::time::Duration;

/// Failures beyond this count no longer change the exponent
const MAX_EXPONENT: u32 = 1_024;

/// Consecutive-failure counter plus schedule
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    /// Create a controller in its base state
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Wait to apply after one more failure
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.failures);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Back to the base delay
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// The wait for the given number of previous failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        let max = self.config.max_delay_ms as f64;
        let base = self.config.base_delay_ms as f64;
        let growth = self.config.multiplier.powi(failures.min(MAX_EXPONENT) as i32);
        let mut delay = if base == 0.0 { 0.0 } else { (base * growth).min(max) };

        if self.config.jitter > 0.0 {
            delay *= 1.0 + self.config.jitter * (fastrand::f64() * 2.0 - 1.0);
            delay = delay.clamp(0.0, max);
        }

        Duration::from_millis(delay.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            base_delay_ms: 1_000,
            multiplier: 1.6,
            jitter: 0.0,
            max_delay_ms: 120_000,
        }
    }

    #[test]
    fn grows_then_caps() {
        let mut backoff = Backoff::new(config());
        let delays: Vec<Duration> = (0..20).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_millis(1_600));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(120));
        assert_eq!(backoff.failures(), 20);
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::new(config());
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn survives_huge_failure_counts() {
        let backoff = Backoff::new(config());
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn flat_schedule_is_constant_time() {
        let backoff = Backoff::new(BackoffConfig {
            multiplier: 1.0,
            ..config()
        });
        let started = std::time::Instant::now();
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(200_000_000), Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn cap_applies_to_exact_powers() {
        let backoff = Backoff::new(BackoffConfig {
            base_delay_ms: 100,
            multiplier: 2.0,
            jitter: 0.0,
            max_delay_ms: 500,
        });
        let delays: Vec<u128> = (0..6).map(|n| backoff.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500, 500]);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let backoff = Backoff::new(BackoffConfig {
            jitter: 0.2,
            ..config()
        });
        for _ in 0..100 {
            let delay = backoff.delay_for(1);
            assert!(delay >= Duration::from_millis(1_280), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_920), "{delay:?}");
        }
    }
}
