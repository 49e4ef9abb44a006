// # Lookup Service Trait
//
// Defines the interface to the DNS capability the resolver drives.
//
// ## Implementations
//
// - hickory-resolver backed: `dnswatch-hickory` crate
// - In-memory tables: `dnswatch_core::lookup::MemoryLookup`
//
// ## Usage
//
// ```rust,ignore
// use dnswatch_core::LookupService;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let lookup = /* LookupService implementation */;
//
//     let ips = lookup.lookup_host("example.com").await?;
//     let srv = lookup.lookup_srv("grpclb", "tcp", "example.com").await?;
//
//     Ok(())
// }
// ```

use crate::error::LookupError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// One SRV answer: where the service lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SrvRecord {
    /// Host serving the record (no trailing dot)
    pub target: String,
    /// Port the service listens on
    pub port: u16,
}

impl SrvRecord {
    /// Create an SRV record
    pub fn new(target: impl Into<String>, port: u16) -> Self {
        Self {
            target: target.into(),
            port,
        }
    }
}

/// Trait for lookup service implementations
///
/// Implementations must be thread-safe and usable across async tasks. They
/// perform exactly one query per call: retries, backoff and scheduling belong
/// to the resolver's watcher loop.
///
/// # Errors
///
/// Return [`LookupError::not_found`] when the name has no records of the
/// requested type. The resolver treats that as "no SRV records" / "no
/// service config" for SRV and TXT lookups, and reports it for host lookups.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Resolve a hostname to its addresses, in answer order
    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, LookupError>;

    /// Query SRV records for `_service._proto.name`
    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> Result<Vec<SrvRecord>, LookupError>;

    /// Query TXT records for `name`, one string per record
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError>;
}

/// Helper trait for constructing lookup services
///
/// The resolver calls exactly one of these methods per session, at build
/// time. Failures surface from `Builder::build` and no session is created.
pub trait LookupServiceFactory: Send + Sync {
    /// The platform default lookup service
    fn default_service(&self) -> Result<Arc<dyn LookupService>, crate::Error>;

    /// A lookup service that sends every query to `authority` (`host:port`)
    fn for_authority(&self, authority: &str) -> Result<Arc<dyn LookupService>, crate::Error>;
}

/// Factory handing out one shared service for every authority
///
/// Useful with [`MemoryLookup`](crate::lookup::MemoryLookup) and in tests.
#[derive(Clone)]
pub struct StaticLookupFactory {
    service: Arc<dyn LookupService>,
}

impl StaticLookupFactory {
    /// Wrap a lookup service
    pub fn new(service: Arc<dyn LookupService>) -> Self {
        Self { service }
    }
}

impl LookupServiceFactory for StaticLookupFactory {
    fn default_service(&self) -> Result<Arc<dyn LookupService>, crate::Error> {
        Ok(Arc::clone(&self.service))
    }

    fn for_authority(&self, authority: &str) -> Result<Arc<dyn LookupService>, crate::Error> {
        debug!("Static lookup factory ignores authority {}", authority);
        Ok(Arc::clone(&self.service))
    }
}
