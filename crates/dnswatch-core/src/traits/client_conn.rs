// # ClientConn Trait
//
// The consumer side of a resolver session: it receives every accepted
// resolution result and every lookup failure.

use serde::{Deserialize, Serialize};

/// A resolved network address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// `host:port`, IPv6 hosts bracketed
    pub addr: String,
    /// Name to verify the endpoint against (set for SRV expansions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

impl Address {
    /// Create an address without a server name
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            server_name: None,
        }
    }

    /// Tag the address with a server name
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }
}

/// The result of one resolution cycle
///
/// An empty `addresses` list is a valid state: the name currently resolves to
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Addresses of the target host itself
    pub addresses: Vec<Address>,
    /// Addresses found through SRV expansion, tagged with the SRV target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub balancer_addresses: Vec<Address>,
    /// Raw service config published in TXT, attribute prefix removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_config: Option<String>,
}

impl State {
    /// Create a state holding only host addresses
    pub fn from_addresses(addresses: Vec<Address>) -> Self {
        Self {
            addresses,
            ..Self::default()
        }
    }
}

/// Trait for resolver consumers
///
/// A session calls its consumer from a single task, never concurrently, and
/// stops calling it once the session is closed. Callbacks run on the watcher
/// task: they should hand work off rather than block, and must not close the
/// resolver that is calling them.
pub trait ClientConn: Send + Sync {
    /// Accept a new state
    ///
    /// Returning an error rejects the state. The resolver then backs off and
    /// resolves again; the rejection is not reported anywhere else.
    fn update_state(&self, state: State) -> crate::Result<()>;

    /// Learn about a failed lookup
    ///
    /// Called instead of `update_state` for the failed cycle. The resolver
    /// keeps retrying with backoff.
    fn report_error(&self, error: crate::Error);
}
