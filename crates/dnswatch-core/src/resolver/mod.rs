//! Resolver sessions
//!
//! A [`Builder`] turns a [`Target`] into a [`Resolver`]. IP-literal targets
//! are answered once, synchronously, during `build`. Hostname targets get a
//! background watcher task that resolves, hands the result to the
//! [`ClientConn`], and then waits for the next reason to resolve again.
//!
//! ## Lifecycle
//!
//! ```text
//!            build
//!              │
//!              ▼
//!           ┌──────┐
//!           │ Idle │
//!           └──────┘
//!              │
//!              ▼
//!        ┌───────────┐   lookup failed / state rejected   ┌─────────┐
//!   ┌───▶│ Resolving │───────────────────────────────────▶│ Backoff │
//!   │    └───────────┘◀───────────────────────────────────└─────────┘
//!   │          │                  timer elapsed
//!   │          │ state accepted
//!   │          ▼
//!   │ ┌─────────────────┐
//!   └─│ AwaitingTrigger │   resolve_now (rate limited) or refresh interval
//!     └─────────────────┘
//!
//!   any phase ── close ──▶ Closed
//! ```

mod watcher;

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use crate::target::{format_ip, parse_authority, parse_target, Target};
use crate::traits::{Address, ClientConn, Clock, LookupServiceFactory, State, TokioClock};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use watcher::Watcher;

/// Observable phase of a resolver session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverPhase {
    /// Built, first cycle not started yet
    Idle,
    /// A lookup cycle is in flight
    Resolving,
    /// Last cycle was accepted; waiting for a trigger
    AwaitingTrigger,
    /// Last cycle failed or was rejected; waiting for the backoff timer
    Backoff,
    /// Closed; no further consumer callbacks
    Closed,
}

/// Factory for resolver sessions
///
/// Holds everything that would otherwise be process-wide: the configuration,
/// the lookup-service factory and the clock.
#[derive(Clone)]
pub struct Builder {
    config: Arc<ResolverConfig>,
    lookup_factory: Arc<dyn LookupServiceFactory>,
    clock: Arc<dyn Clock>,
}

impl Builder {
    /// Create a builder using tokio timers
    pub fn new(config: ResolverConfig, lookup_factory: Arc<dyn LookupServiceFactory>) -> Self {
        Self {
            config: Arc::new(config),
            lookup_factory,
            clock: Arc::new(TokioClock),
        }
    }

    /// Replace the clock (deterministic tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration sessions are built with
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Start resolving `target` for `consumer`
    ///
    /// Parsing and lookup-service construction happen here; any failure is
    /// returned before a task is spawned. Hostname targets spawn the watcher,
    /// so this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config): the configuration is invalid
    /// - [`Error::InvalidTarget`](crate::Error::InvalidTarget): unparseable
    ///   target or authority
    /// - [`Error::Build`](crate::Error::Build): the lookup-service factory failed
    pub fn build(&self, target: Target, consumer: Arc<dyn ClientConn>) -> Result<Resolver> {
        self.config.validate()?;

        let authority = if target.authority.is_empty() {
            None
        } else {
            Some(parse_authority(
                &target.authority,
                &self.config.default_authority_port,
            )?)
        };
        let (host, port) = parse_target(&target.endpoint, &self.config.default_port)?;

        if let Some(ip) = format_ip(&host) {
            let state = State::from_addresses(vec![Address::new(format!("{ip}:{port}"))]);
            debug!("Target {} is an IP literal, emitting {:?} once", target, state.addresses);
            if let Err(e) = consumer.update_state(state) {
                warn!("Consumer rejected literal address for {}: {}", target, e);
            }
            return Ok(Resolver::fixed(target));
        }

        let lookup = match &authority {
            None => self.lookup_factory.default_service()?,
            Some(authority) => {
                debug!("Routing lookups for {} through {}", target, authority);
                self.lookup_factory.for_authority(authority)?
            }
        };

        let cancel = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));
        let (phase, _) = watch::channel(ResolverPhase::Idle);
        let phase = Arc::new(phase);
        let limiter = Arc::new(RateLimiter::new(self.config.min_resolution_interval()));

        let watcher = Watcher {
            host,
            port,
            config: Arc::clone(&self.config),
            lookup,
            consumer,
            clock: Arc::clone(&self.clock),
            limiter: Arc::clone(&limiter),
            backoff: crate::backoff::Backoff::new(self.config.backoff.clone()),
            cancel: cancel.clone(),
            gate: Arc::clone(&gate),
            phase: Arc::clone(&phase),
        };

        info!("Starting resolver for {}", target);
        let task = tokio::spawn(watcher.run());

        Ok(Resolver {
            target,
            limiter: Some(limiter),
            cancel,
            gate,
            phase,
            task: Mutex::new(Some(task)),
        })
    }
}

/// A running resolution session
///
/// Dropping the resolver closes it.
pub struct Resolver {
    target: Target,
    /// `None` for IP-literal targets, which never resolve again
    limiter: Option<Arc<RateLimiter>>,
    cancel: CancellationToken,
    /// Held by the watcher around every consumer callback
    gate: Arc<Mutex<()>>,
    phase: Arc<watch::Sender<ResolverPhase>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Resolver {
    fn fixed(target: Target) -> Self {
        let (phase, _) = watch::channel(ResolverPhase::AwaitingTrigger);
        Self {
            target,
            limiter: None,
            cancel: CancellationToken::new(),
            gate: Arc::new(Mutex::new(())),
            phase: Arc::new(phase),
            task: Mutex::new(None),
        }
    }

    /// The target this session resolves
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Ask for an out-of-band resolution
    ///
    /// Best effort and never blocking: requests are coalesced and rate
    /// limited. No-op for IP literals and closed sessions.
    pub fn resolve_now(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(limiter) = &self.limiter {
            if limiter.admit() {
                debug!("Re-resolution of {} requested", self.target);
            } else {
                trace!("Re-resolution of {} already pending", self.target);
            }
        }
    }

    /// Stop the session
    ///
    /// Idempotent. Once this returns, the consumer receives no further
    /// callbacks; a callback already running when `close` is called finishes
    /// first. Must not be called from inside a consumer callback.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("Closing resolver for {}", self.target);
        }
        self.cancel.cancel();
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
        self.phase.send_replace(ResolverPhase::Closed);
    }

    /// Close and wait for the watcher task to exit
    pub async fn close_and_wait(&self) {
        self.close();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Resolver task for {} ended abnormally: {}", self.target, e);
            }
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current phase of the session
    pub fn phase(&self) -> ResolverPhase {
        *self.phase.borrow()
    }

    /// Follow phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<ResolverPhase> {
        self.phase.subscribe()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("target", &self.target)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
