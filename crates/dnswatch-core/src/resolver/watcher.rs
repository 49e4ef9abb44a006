//! The watcher loop behind a hostname [`Resolver`](super::Resolver)
//!
//! One task per session. Each iteration runs one lookup cycle, delivers the
//! result to the consumer, and then waits either for a trigger (accepted) or
//! for the backoff timer (failed or rejected). Every wait races the session's
//! cancellation token.

use super::ResolverPhase;
use crate::backoff::Backoff;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::rate_limit::RateLimiter;
use crate::target::join_host_port;
use crate::traits::{Address, ClientConn, Clock, LookupService, Sleep, State};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of the TXT name carrying the service config
const TXT_PREFIX: &str = "_grpc_config.";

/// Attribute a TXT payload must start with to count as service config
const TXT_ATTRIBUTE: &str = "grpc_config=";

pub(super) struct Watcher {
    pub(super) host: String,
    pub(super) port: String,
    pub(super) config: Arc<ResolverConfig>,
    pub(super) lookup: Arc<dyn LookupService>,
    pub(super) consumer: Arc<dyn ClientConn>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) limiter: Arc<RateLimiter>,
    pub(super) backoff: Backoff,
    pub(super) cancel: CancellationToken,
    pub(super) gate: Arc<Mutex<()>>,
    pub(super) phase: Arc<watch::Sender<ResolverPhase>>,
}

impl Watcher {
    pub(super) async fn run(mut self) {
        loop {
            self.set_phase(ResolverPhase::Resolving);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.resolve() => result,
            };

            let accepted = match result {
                Ok(state) => {
                    debug!(
                        "Resolved {}: {} address(es), {} balancer address(es)",
                        self.host,
                        state.addresses.len(),
                        state.balancer_addresses.len()
                    );
                    match self.deliver(|consumer| consumer.update_state(state)) {
                        None => break,
                        Some(Ok(())) => true,
                        Some(Err(e)) => {
                            warn!("Consumer rejected state for {}: {}", self.host, e);
                            false
                        }
                    }
                }
                Err(e) => {
                    warn!("Resolution of {} failed: {}", self.host, e);
                    if self.deliver(|consumer| consumer.report_error(e)).is_none() {
                        break;
                    }
                    false
                }
            };

            let proceed = if accepted {
                self.backoff.reset();
                self.await_trigger().await
            } else {
                self.await_backoff().await
            };
            if !proceed {
                break;
            }
        }

        self.phase.send_replace(ResolverPhase::Closed);
        info!("Resolver for {} stopped", self.host);
    }

    /// Run a consumer callback unless the session is closed
    ///
    /// The gate makes `Resolver::close` wait for a callback in progress.
    fn deliver<T>(&self, callback: impl FnOnce(&dyn ClientConn) -> T) -> Option<T> {
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(callback(self.consumer.as_ref()))
    }

    fn set_phase(&self, phase: ResolverPhase) {
        publish_phase(&self.phase, &self.cancel, phase);
    }

    /// Wait for a rate-limited trigger or the refresh interval
    ///
    /// Returns `false` when the session was closed.
    async fn await_trigger(&self) -> bool {
        self.set_phase(ResolverPhase::AwaitingTrigger);

        // The rate-limit window starts now, when the cycle completed.
        let min_interval = self.limiter.min_interval();
        let window: Option<Sleep> =
            (!min_interval.is_zero()).then(|| self.clock.sleep(min_interval));
        let refresh: Sleep = match self.config.refresh_interval() {
            Some(interval) => self.clock.sleep(interval),
            None => Box::pin(std::future::pending()),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            _ = self.limiter.triggered() => {}
            _ = refresh => {
                debug!("Refresh interval elapsed for {}", self.host);
                return true;
            }
        }

        if let Some(window) = window {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = window => {}
            }
        }
        self.limiter.consume();
        true
    }

    /// Wait out the next backoff delay
    ///
    /// Returns `false` when the session was closed.
    async fn await_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        self.set_phase(ResolverPhase::Backoff);
        debug!(
            "Backing off {:?} before resolving {} again (failure #{})",
            delay,
            self.host,
            self.backoff.failures()
        );

        let timer = self.clock.sleep(delay);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = timer => true,
        }
    }

    /// One lookup cycle
    ///
    /// Fails only when the host lookup failed and SRV expansion produced
    /// nothing to fall back on.
    async fn resolve(&self) -> Result<State> {
        let balancer = self.lookup_srv().await;
        let hosts = self.lookup_host().await;

        let (addresses, balancer_addresses) = match (hosts, balancer) {
            (Ok(addresses), Ok(balancer)) => (addresses, balancer),
            (Ok(addresses), Err(e)) => {
                debug!("Ignoring SRV failure for {}: {}", self.host, e);
                (addresses, Vec::new())
            }
            (Err(e), Ok(balancer)) if !balancer.is_empty() => {
                debug!("Host lookup for {} failed, keeping SRV results: {}", self.host, e);
                (Vec::new(), balancer)
            }
            (Err(e), _) => return Err(e),
        };

        let service_config = if self.config.disable_service_config {
            None
        } else {
            self.lookup_txt().await
        };

        Ok(State {
            addresses,
            balancer_addresses,
            service_config,
        })
    }

    async fn lookup_host(&self) -> Result<Vec<Address>> {
        let ips = self
            .lookup
            .lookup_host(&self.host)
            .await
            .map_err(|e| Error::lookup("A", e))?;
        Ok(ips
            .into_iter()
            .map(|ip| Address::new(join_host_port(&ip.to_string(), &self.port)))
            .collect())
    }

    async fn lookup_srv(&self) -> Result<Vec<Address>> {
        if !self.config.enable_srv_lookups {
            return Ok(Vec::new());
        }

        let records = match self
            .lookup
            .lookup_srv(&self.config.srv_service, &self.config.srv_proto, &self.host)
            .await
        {
            Ok(records) => records,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(Error::lookup("SRV", e)),
        };

        let mut addresses = Vec::new();
        for record in records {
            let ips = match self.lookup.lookup_host(&record.target).await {
                Ok(ips) => ips,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(Error::lookup("A", e)),
            };
            let port = record.port.to_string();
            addresses.extend(ips.into_iter().map(|ip| {
                Address::new(join_host_port(&ip.to_string(), &port))
                    .with_server_name(record.target.clone())
            }));
        }
        Ok(addresses)
    }

    async fn lookup_txt(&self) -> Option<String> {
        let name = format!("{TXT_PREFIX}{}", self.host);
        let records = match self.lookup.lookup_txt(&name).await {
            Ok(records) => records,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                warn!("{}", Error::lookup("TXT", e));
                return None;
            }
        };

        let joined = records.concat();
        match joined.strip_prefix(TXT_ATTRIBUTE) {
            Some(config) => Some(config.to_string()),
            None => {
                if !joined.is_empty() {
                    warn!("TXT record {} missing {} attribute", joined, TXT_ATTRIBUTE);
                }
                None
            }
        }
    }
}

/// Publish `next` unless the session is closing
///
/// The check runs under the channel's lock, so a `Closed` published by
/// `Resolver::close` is never overwritten.
fn publish_phase(
    phase: &watch::Sender<ResolverPhase>,
    cancel: &CancellationToken,
    next: ResolverPhase,
) -> bool {
    phase.send_if_modified(|current| {
        if *current == ResolverPhase::Closed || cancel.is_cancelled() || *current == next {
            return false;
        }
        *current = next;
        true
    })
}
