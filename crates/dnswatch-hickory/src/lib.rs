// # Hickory Lookup Service
//
// This crate provides the network-backed LookupService for dnswatch, built on
// hickory-resolver.
//
// ## Upstreams
//
// - **System**: name servers and options from the platform configuration
//   (`/etc/resolv.conf` on Unix)
// - **Authority**: one explicit `host:port` DNS server, queried over UDP with
//   TCP fallback. IP authorities are wired up immediately; hostname
//   authorities are resolved through the system on first use.
//
// ## Responsibilities
//
// One query per call. No retries beyond hickory's own per-query attempts, no
// caching decisions, no scheduling: the resolver's watcher loop owns all of
// that.
//
// ## Error Mapping
//
// | hickory                          | LookupErrorKind |
// |----------------------------------|-----------------|
// | NoRecordsFound (SERVFAIL)        | Temporary       |
// | NoRecordsFound (anything else)   | NotFound        |
// | Timeout                          | Timeout         |
// | NoConnections, Io, Proto         | Temporary       |
// | everything else                  | Other           |

use async_trait::async_trait;
use dnswatch_core::error::{Error, LookupError, LookupErrorKind, Result};
use dnswatch_core::traits::{LookupService, LookupServiceFactory, SrvRecord};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Per-query timeout (hickory's default)
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts per query before giving up
const DEFAULT_ATTEMPTS: usize = 2;

/// Knobs applied to every hickory resolver this crate builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HickoryOptions {
    /// Timeout of a single query
    pub query_timeout: Duration,
    /// Attempts per query
    pub attempts: usize,
    /// Answer from the hosts file before asking the network (system upstream only)
    pub use_hosts_file: bool,
}

impl Default for HickoryOptions {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
            use_hosts_file: true,
        }
    }
}

impl HickoryOptions {
    fn apply(&self, opts: &mut ResolverOpts) {
        opts.timeout = self.query_timeout;
        opts.attempts = self.attempts;
        opts.use_hosts_file = self.use_hosts_file;
    }
}

/// LookupService backed by a hickory `TokioAsyncResolver`
pub struct HickoryLookup {
    /// Authority still to be resolved; `None` once the resolver is eager
    pending_authority: Option<String>,
    options: HickoryOptions,
    resolver: OnceCell<TokioAsyncResolver>,
}

impl std::fmt::Debug for HickoryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryLookup")
            .field("pending_authority", &self.pending_authority)
            .field("options", &self.options)
            .field("ready", &self.resolver.initialized())
            .finish()
    }
}

impl HickoryLookup {
    /// Query the name servers from the platform configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] if the system configuration cannot be read.
    pub fn system(options: HickoryOptions) -> Result<Self> {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| Error::build(format!("cannot read system DNS configuration: {e}")))?;
        options.apply(&mut opts);
        debug!(
            "Using {} system name server(s)",
            config.name_servers().len()
        );

        Ok(Self {
            pending_authority: None,
            options,
            resolver: OnceCell::new_with(Some(TokioAsyncResolver::tokio(config, opts))),
        })
    }

    /// Query a single DNS server at `authority` (`host:port`)
    pub fn authority(authority: &str, options: HickoryOptions) -> Self {
        match authority.parse::<SocketAddr>() {
            Ok(addr) => {
                let resolver = authority_resolver(addr, &options);
                Self {
                    pending_authority: None,
                    options,
                    resolver: OnceCell::new_with(Some(resolver)),
                }
            }
            Err(_) => Self {
                pending_authority: Some(authority.to_string()),
                options,
                resolver: OnceCell::new(),
            },
        }
    }

    /// Whether the underlying resolver has been constructed
    pub fn is_ready(&self) -> bool {
        self.resolver.initialized()
    }

    async fn resolver(&self) -> std::result::Result<&TokioAsyncResolver, LookupError> {
        self.resolver
            .get_or_try_init(|| async {
                let Some(authority) = self.pending_authority.as_deref() else {
                    return Err(LookupError::other("resolver", "no upstream configured"));
                };
                let addr = tokio::net::lookup_host(authority)
                    .await
                    .map_err(|e| LookupError::temporary(authority, e.to_string()))?
                    .next()
                    .ok_or_else(|| LookupError::not_found(authority, "authority has no addresses"))?;
                debug!("DNS authority {} resolved to {}", authority, addr);
                Ok(authority_resolver(addr, &self.options))
            })
            .await
    }
}

fn authority_resolver(addr: SocketAddr, options: &HickoryOptions) -> TokioAsyncResolver {
    let mut config = ResolverConfig::new();
    for protocol in [Protocol::Udp, Protocol::Tcp] {
        config.add_name_server(NameServerConfig {
            socket_addr: addr,
            protocol,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let mut opts = ResolverOpts::default();
    options.apply(&mut opts);
    // Answers must come from the chosen server.
    opts.use_hosts_file = false;
    TokioAsyncResolver::tokio(config, opts)
}

/// Map a hickory failure onto the resolver's error classes
pub fn classify(name: &str, err: &ResolveError) -> LookupError {
    let kind = match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::ServFail =>
        {
            LookupErrorKind::Temporary
        }
        ResolveErrorKind::NoRecordsFound { .. } => LookupErrorKind::NotFound,
        ResolveErrorKind::Timeout => LookupErrorKind::Timeout,
        ResolveErrorKind::NoConnections | ResolveErrorKind::Io(_) | ResolveErrorKind::Proto(_) => {
            LookupErrorKind::Temporary
        }
        _ => LookupErrorKind::Other,
    };
    LookupError::new(kind, name, err.to_string())
}

#[async_trait]
impl LookupService for HickoryLookup {
    async fn lookup_host(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        let resolver = self.resolver().await?;
        let lookup = resolver
            .lookup_ip(host)
            .await
            .map_err(|e| classify(host, &e))?;
        Ok(lookup.iter().collect())
    }

    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> std::result::Result<Vec<SrvRecord>, LookupError> {
        let query = format!("_{service}._{proto}.{name}");
        let resolver = self.resolver().await?;
        let lookup = resolver
            .srv_lookup(query.as_str())
            .await
            .map_err(|e| classify(&query, &e))?;
        Ok(lookup
            .iter()
            .map(|srv| {
                let target = srv.target().to_utf8();
                SrvRecord::new(target.trim_end_matches('.'), srv.port())
            })
            .collect())
    }

    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, LookupError> {
        let resolver = self.resolver().await?;
        let lookup = resolver
            .txt_lookup(name)
            .await
            .map_err(|e| classify(name, &e))?;
        // A record may be split into several character-strings.
        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect())
    }
}

/// Factory producing [`HickoryLookup`] services
#[derive(Debug, Clone, Default)]
pub struct HickoryLookupFactory {
    options: HickoryOptions,
}

impl HickoryLookupFactory {
    /// Create a factory whose lookup services share `options`
    ///
    /// Nothing is resolved or read from the system until a service is requested.
    pub fn new(options: HickoryOptions) -> Self {
        Self { options }
    }
}

impl LookupServiceFactory for HickoryLookupFactory {
    fn default_service(&self) -> Result<Arc<dyn LookupService>> {
        Ok(Arc::new(HickoryLookup::system(self.options.clone())?))
    }

    fn for_authority(&self, authority: &str) -> Result<Arc<dyn LookupService>> {
        debug!("Creating hickory lookup service for authority {}", authority);
        Ok(Arc::new(HickoryLookup::authority(authority, self.options.clone())))
    }
}
