// # Memory Lookup
//
// In-memory implementation of LookupService.
//
// ## Purpose
//
// Answers host, SRV and TXT queries from tables the caller fills and mutates
// at runtime. Nothing touches the network, which makes it the lookup service
// of choice for tests and for fixed service maps.
//
// ## Misses
//
// A name missing from a table yields `LookupError::not_found`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::LookupError;
use crate::traits::lookup_service::{LookupService, SrvRecord};

#[derive(Debug, Default)]
struct Tables {
    hosts: HashMap<String, Vec<IpAddr>>,
    /// Keyed by the full `_service._proto.name`
    srv: HashMap<String, Vec<SrvRecord>>,
    txt: HashMap<String, Vec<String>>,
}

/// In-memory lookup service
///
/// Clones share the same tables.
///
/// # Example
///
/// ```rust,no_run
/// use dnswatch_core::lookup::MemoryLookup;
/// use dnswatch_core::traits::LookupService;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let lookup = MemoryLookup::new();
///     lookup.set_host("foo.bar.com", vec!["1.2.3.4".parse()?]).await;
///
///     let ips = lookup.lookup_host("foo.bar.com").await?;
///     assert_eq!(ips, vec!["1.2.3.4".parse::<std::net::IpAddr>()?]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    inner: Arc<RwLock<Tables>>,
    host_lookups: Arc<AtomicUsize>,
}

impl MemoryLookup {
    /// Create a lookup service with empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the addresses of a host, replacing previous ones
    pub async fn set_host(&self, host: impl Into<String>, ips: Vec<IpAddr>) {
        self.inner.write().await.hosts.insert(host.into(), ips);
    }

    /// Forget a host; later lookups fail with "not found"
    pub async fn remove_host(&self, host: &str) -> Option<Vec<IpAddr>> {
        self.inner.write().await.hosts.remove(host)
    }

    /// Set the SRV records of `_service._proto.name`
    pub async fn set_srv(&self, service: &str, proto: &str, name: &str, records: Vec<SrvRecord>) {
        self.inner
            .write()
            .await
            .srv
            .insert(srv_name(service, proto, name), records);
    }

    /// Set the TXT records of a name
    pub async fn set_txt(&self, name: impl Into<String>, records: Vec<String>) {
        self.inner.write().await.txt.insert(name.into(), records);
    }

    /// Number of host lookups served so far
    pub fn host_lookups(&self) -> usize {
        self.host_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupService for MemoryLookup {
    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
        self.host_lookups.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.read().await;
        guard
            .hosts
            .get(host)
            .cloned()
            .ok_or_else(|| LookupError::not_found(host, "no such host"))
    }

    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> Result<Vec<SrvRecord>, LookupError> {
        let key = srv_name(service, proto, name);
        let guard = self.inner.read().await;
        match guard.srv.get(&key) {
            Some(records) => Ok(records.clone()),
            None => Err(LookupError::not_found(key, "no SRV records")),
        }
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let guard = self.inner.read().await;
        guard
            .txt
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::not_found(name, "no TXT records"))
    }
}

fn srv_name(service: &str, proto: &str, name: &str) -> String {
    format!("_{service}._{proto}.{name}")
}
