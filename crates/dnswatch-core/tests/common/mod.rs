//! Test doubles and common utilities for resolver contract tests
//!
//! The lookup tables mirror a small fake DNS zone: plain A/AAAA hosts, SRV
//! names pointing at them, and one name that never resolves.

#![allow(dead_code)]

use dnswatch_core::error::{Error, LookupError, LookupErrorKind, Result};
use dnswatch_core::lookup::MemoryLookup;
use dnswatch_core::traits::{
    ClientConn, LookupService, LookupServiceFactory, SrvRecord, State, StaticLookupFactory,
};
use dnswatch_core::{Builder, ManualClock, PendingTimer, Resolver, ResolverConfig, ResolverPhase};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a test waits for something that should happen
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test waits to be confident something does not happen
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

const HOSTS: &[(&str, &[&str])] = &[
    ("foo.bar.com", &["1.2.3.4", "5.6.7.8"]),
    ("ipv4.single.fake", &["1.2.3.4"]),
    ("srv.ipv4.single.fake", &["2.4.6.8"]),
    ("srv.ipv4.multi.fake", &[]),
    ("srv.ipv6.single.fake", &[]),
    ("srv.ipv6.multi.fake", &[]),
    ("ipv4.multi.fake", &["1.2.3.4", "5.6.7.8", "9.10.11.12"]),
    ("ipv6.single.fake", &["2607:f8b0:400a:801::1001"]),
    (
        "ipv6.multi.fake",
        &[
            "2607:f8b0:400a:801::1001",
            "2607:f8b0:400a:801::1002",
            "2607:f8b0:400a:801::1003",
        ],
    ),
];

const SRV: &[(&str, &str, u16)] = &[
    ("srv.ipv4.single.fake", "ipv4.single.fake", 1234),
    ("srv.ipv4.multi.fake", "ipv4.multi.fake", 1234),
    ("srv.ipv6.single.fake", "ipv6.single.fake", 1234),
    ("srv.ipv6.multi.fake", "ipv6.multi.fake", 1234),
];

/// Service config published for foo.bar.com
pub const FOO_SERVICE_CONFIG: &str =
    r#"[{"serviceConfig":{"loadBalancingPolicy":"round_robin"}}]"#;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A MemoryLookup filled with the fake zone
pub async fn fake_zone() -> MemoryLookup {
    let lookup = MemoryLookup::new();
    for (host, ips) in HOSTS {
        lookup
            .set_host(*host, ips.iter().map(|s| ip(s)).collect())
            .await;
    }
    for (name, target, port) in SRV {
        lookup
            .set_srv("grpclb", "tcp", name, vec![SrvRecord::new(*target, *port)])
            .await;
    }
    lookup
        .set_txt(
            "_grpc_config.foo.bar.com",
            vec![format!("grpc_config={FOO_SERVICE_CONFIG}")],
        )
        .await;
    lookup
}

/// Configuration with rate limiting off, so explicit triggers act at once
pub fn unthrottled() -> ResolverConfig {
    ResolverConfig::new().with_min_resolution_interval_secs(0)
}

/// Builder over a lookup service, with tokio timers
pub fn builder(config: ResolverConfig, lookup: Arc<dyn LookupService>) -> Builder {
    Builder::new(config, Arc::new(StaticLookupFactory::new(lookup)))
}

/// Builder over a lookup service, with timers the test fires by hand
pub fn manual_builder(
    config: ResolverConfig,
    lookup: Arc<dyn LookupService>,
) -> (Builder, mpsc::UnboundedReceiver<PendingTimer>) {
    let (clock, timers) = ManualClock::new();
    (builder(config, lookup).with_clock(Arc::new(clock)), timers)
}

/// Wait for the next timer the watcher creates
pub async fn next_timer(timers: &mut mpsc::UnboundedReceiver<PendingTimer>) -> PendingTimer {
    tokio::time::timeout(EVENT_TIMEOUT, timers.recv())
        .await
        .expect("timed out waiting for a timer")
        .expect("clock dropped")
}

/// Assert that the watcher creates no timer for a while
pub async fn assert_no_timer(timers: &mut mpsc::UnboundedReceiver<PendingTimer>) {
    if let Ok(Some(timer)) = tokio::time::timeout(QUIET_PERIOD, timers.recv()).await {
        panic!("unexpected timer of {:?}", timer.duration());
    }
}

/// One consumer callback, as seen by the test
#[derive(Debug)]
pub enum Callback {
    Update(State),
    Error(String),
}

/// Consumer that records every callback
///
/// Can be told to reject a number of updates before accepting again.
pub struct RecordingClientConn {
    tx: mpsc::UnboundedSender<Callback>,
    update_calls: AtomicUsize,
    error_calls: AtomicUsize,
    rejections_left: AtomicUsize,
    reject_all: AtomicBool,
    last_state: Mutex<Option<State>>,
}

impl RecordingClientConn {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Callback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            tx,
            update_calls: AtomicUsize::new(0),
            error_calls: AtomicUsize::new(0),
            rejections_left: AtomicUsize::new(0),
            reject_all: AtomicBool::new(false),
            last_state: Mutex::new(None),
        };
        (Arc::new(conn), rx)
    }

    /// Reject the next `n` updates
    pub fn reject_next(&self, n: usize) {
        self.rejections_left.store(n, Ordering::SeqCst);
    }

    /// Reject every update until told otherwise
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn error_calls(&self) -> usize {
        self.error_calls.load(Ordering::SeqCst)
    }

    pub fn last_state(&self) -> Option<State> {
        self.last_state.lock().unwrap().clone()
    }

    fn should_reject(&self) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return true;
        }
        self.rejections_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ClientConn for RecordingClientConn {
    fn update_state(&self, state: State) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_state.lock().unwrap() = Some(state.clone());
        let _ = self.tx.send(Callback::Update(state));
        if self.should_reject() {
            return Err(Error::rejected("test consumer rejected the state"));
        }
        Ok(())
    }

    fn report_error(&self, error: Error) {
        self.error_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(Callback::Error(error.to_string()));
    }
}

/// Wait for the next callback
pub async fn next_callback(rx: &mut mpsc::UnboundedReceiver<Callback>) -> Callback {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("consumer dropped")
}

/// Wait for the next callback and require it to be a state update
pub async fn next_state(rx: &mut mpsc::UnboundedReceiver<Callback>) -> State {
    match next_callback(rx).await {
        Callback::Update(state) => state,
        Callback::Error(e) => panic!("expected a state update, got error: {e}"),
    }
}

/// Wait for the next callback and require it to be an error
pub async fn next_error(rx: &mut mpsc::UnboundedReceiver<Callback>) -> String {
    match next_callback(rx).await {
        Callback::Error(e) => e,
        Callback::Update(state) => panic!("expected an error, got state: {state:?}"),
    }
}

/// Assert that no callback arrives for a while
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Callback>) {
    if let Ok(Some(callback)) = tokio::time::timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("unexpected callback: {callback:?}");
    }
}

/// Wait until the resolver reaches `phase`
pub async fn wait_for_phase(resolver: &Resolver, phase: ResolverPhase) {
    let mut phases = resolver.subscribe_phase();
    tokio::time::timeout(EVENT_TIMEOUT, phases.wait_for(|p| *p == phase))
        .await
        .expect("timed out waiting for phase")
        .expect("phase sender dropped");
}

/// Addresses of a state, as plain strings
pub fn addrs(state: &State) -> Vec<String> {
    state.addresses.iter().map(|a| a.addr.clone()).collect()
}

/// Lookup service wrapper that counts host lookups and can stall them
pub struct ControlledLookup {
    inner: Arc<dyn LookupService>,
    host_calls: AtomicUsize,
    started_tx: mpsc::UnboundedSender<String>,
    stall: AtomicBool,
}

impl ControlledLookup {
    pub fn new(inner: Arc<dyn LookupService>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let lookup = Self {
            inner,
            host_calls: AtomicUsize::new(0),
            started_tx,
            stall: AtomicBool::new(false),
        };
        (Arc::new(lookup), started_rx)
    }

    /// Make host lookups hang forever
    pub fn set_stall(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn host_calls(&self) -> usize {
        self.host_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LookupService for ControlledLookup {
    async fn lookup_host(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        self.host_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(host.to_string());
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.lookup_host(host).await
    }

    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> std::result::Result<Vec<SrvRecord>, LookupError> {
        self.inner.lookup_srv(service, proto, name).await
    }

    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, LookupError> {
        self.inner.lookup_txt(name).await
    }
}

/// Lookup service wrapper that fails chosen names with a chosen kind
///
/// Names not marked as failing are answered by the wrapped service.
pub struct FaultyLookup {
    inner: Arc<dyn LookupService>,
    hosts: Mutex<HashMap<String, LookupErrorKind>>,
    srv: Mutex<HashMap<String, LookupErrorKind>>,
    txt: Mutex<HashMap<String, LookupErrorKind>>,
}

impl FaultyLookup {
    pub fn new(inner: Arc<dyn LookupService>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hosts: Mutex::new(HashMap::new()),
            srv: Mutex::new(HashMap::new()),
            txt: Mutex::new(HashMap::new()),
        })
    }

    /// Fail host lookups of `name`
    pub fn fail_host(&self, name: &str, kind: LookupErrorKind) {
        self.hosts.lock().unwrap().insert(name.to_string(), kind);
    }

    /// Fail SRV lookups for the host `name`, whatever the service labels
    pub fn fail_srv(&self, name: &str, kind: LookupErrorKind) {
        self.srv.lock().unwrap().insert(name.to_string(), kind);
    }

    /// Fail TXT lookups of `name`
    pub fn fail_txt(&self, name: &str, kind: LookupErrorKind) {
        self.txt.lock().unwrap().insert(name.to_string(), kind);
    }

    fn fault(
        table: &Mutex<HashMap<String, LookupErrorKind>>,
        name: &str,
    ) -> std::result::Result<(), LookupError> {
        match table.lock().unwrap().get(name) {
            Some(kind) => Err(LookupError::new(*kind, name, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl LookupService for FaultyLookup {
    async fn lookup_host(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        Self::fault(&self.hosts, host)?;
        self.inner.lookup_host(host).await
    }

    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> std::result::Result<Vec<SrvRecord>, LookupError> {
        Self::fault(&self.srv, name)?;
        self.inner.lookup_srv(service, proto, name).await
    }

    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, LookupError> {
        Self::fault(&self.txt, name)?;
        self.inner.lookup_txt(name).await
    }
}

/// Factory recording which authorities it was asked for
pub struct RecordingFactory {
    service: Arc<dyn LookupService>,
    authorities: Mutex<Vec<String>>,
    default_calls: AtomicUsize,
    fail: bool,
}

impl RecordingFactory {
    pub fn new(service: Arc<dyn LookupService>) -> Arc<Self> {
        Arc::new(Self {
            service,
            authorities: Mutex::new(Vec::new()),
            default_calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    /// A factory whose every call fails
    pub fn failing(service: Arc<dyn LookupService>) -> Arc<Self> {
        Arc::new(Self {
            service,
            authorities: Mutex::new(Vec::new()),
            default_calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn authorities(&self) -> Vec<String> {
        self.authorities.lock().unwrap().clone()
    }

    pub fn default_calls(&self) -> usize {
        self.default_calls.load(Ordering::SeqCst)
    }

    /// Total number of lookup services handed out or refused
    pub fn total_calls(&self) -> usize {
        self.default_calls() + self.authorities.lock().unwrap().len()
    }
}

impl LookupServiceFactory for RecordingFactory {
    fn default_service(&self) -> Result<Arc<dyn LookupService>> {
        self.default_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::build("no system resolver available"));
        }
        Ok(Arc::clone(&self.service))
    }

    fn for_authority(&self, authority: &str) -> Result<Arc<dyn LookupService>> {
        self.authorities.lock().unwrap().push(authority.to_string());
        if self.fail {
            return Err(Error::build(format!("cannot reach {authority}")));
        }
        Ok(Arc::clone(&self.service))
    }
}
