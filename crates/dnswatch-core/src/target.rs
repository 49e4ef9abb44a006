//! Target and authority parsing
//!
//! A target is `host`, `host:port`, an IPv4 literal, a bare IPv6 literal, or a
//! bracketed IPv6 literal with an optional port. Ports are kept as strings so
//! named services (`example.org:http`) pass through untouched.

use crate::error::InvalidTarget;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Host assumed when a target names only a port (`:80`)
const LOCAL_HOST: &str = "localhost";

/// URI scheme accepted by [`Target::from_uri`]
const DNS_SCHEME: &str = "dns://";

/// What a resolver is asked to resolve
///
/// `authority` names an alternate lookup service (e.g. a DNS server); empty
/// means the platform default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The name to resolve
    pub endpoint: String,
    /// Address of the lookup service to use, empty for the default
    #[serde(default)]
    pub authority: String,
}

impl Target {
    /// Create a target resolved through the default lookup service
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            authority: String::new(),
        }
    }

    /// Route lookups through the given authority
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Parse `dns://[authority]/endpoint`; anything else is a bare endpoint
    ///
    /// ```
    /// use dnswatch_core::Target;
    ///
    /// let target = Target::from_uri("dns://8.8.8.8/example.com:443");
    /// assert_eq!(target.authority, "8.8.8.8");
    /// assert_eq!(target.endpoint, "example.com:443");
    /// ```
    pub fn from_uri(uri: &str) -> Self {
        match uri.strip_prefix(DNS_SCHEME) {
            Some(rest) => match rest.split_once('/') {
                Some((authority, endpoint)) => Self::new(endpoint).with_authority(authority),
                None => Self::new(rest),
            },
            None => Self::new(uri),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.authority.is_empty() {
            f.write_str(&self.endpoint)
        } else {
            write!(f, "{DNS_SCHEME}{}/{}", self.authority, self.endpoint)
        }
    }
}

/// Split a target into host and port, substituting `default_port`
///
/// Bare IP literals (including IPv6 such as `::1`) keep the whole string as
/// host. `:port` maps to `localhost`.
pub fn parse_target(target: &str, default_port: &str) -> Result<(String, String), InvalidTarget> {
    if target.is_empty() {
        return Err(InvalidTarget::MissingAddress);
    }
    if target.parse::<IpAddr>().is_ok() {
        return Ok((target.to_string(), default_port.to_string()));
    }
    if target.ends_with(':') {
        return Err(InvalidTarget::EndsWithColon);
    }

    if let Some(rest) = target.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            return Err(InvalidTarget::malformed(target, "missing ']' in address"));
        };
        let host = &rest[..end];
        let port = match &rest[end + 1..] {
            "" => default_port,
            after => match after.strip_prefix(':') {
                Some(port) => port,
                None => {
                    return Err(InvalidTarget::malformed(
                        target,
                        "unexpected characters after ']' in address",
                    ));
                }
            },
        };
        if host.contains('[') {
            return Err(InvalidTarget::malformed(target, "unexpected '[' in address"));
        }
        check_port(target, port)?;
        return Ok((or_localhost(host), port.to_string()));
    }

    // More than one colon without brackets: an IPv6-style literal, no port.
    if target.matches(':').count() > 1 {
        check_host(target, target)?;
        return Ok((target.to_string(), default_port.to_string()));
    }

    let (host, port) = target.rsplit_once(':').unwrap_or((target, default_port));
    check_host(target, host)?;
    check_port(target, port)?;
    Ok((or_localhost(host), port.to_string()))
}

/// Normalise a custom authority to `host:port`
///
/// Same rules as [`parse_target`] with `default_port` taking the place of the
/// target port, then re-joined (IPv6 hosts bracketed).
pub fn parse_authority(authority: &str, default_port: &str) -> Result<String, InvalidTarget> {
    let (host, port) = parse_target(authority, default_port)?;
    Ok(join_host_port(&host, &port))
}

/// Join host and port, bracketing hosts that contain a colon
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Return the host as an address literal when it is an IP, IPv6 bracketed
///
/// The caller's spelling is preserved, not the canonical form.
pub fn format_ip(host: &str) -> Option<String> {
    match host.parse::<IpAddr>().ok()? {
        IpAddr::V4(_) => Some(host.to_string()),
        IpAddr::V6(_) => Some(format!("[{host}]")),
    }
}

fn or_localhost(host: &str) -> String {
    if host.is_empty() {
        LOCAL_HOST.to_string()
    } else {
        host.to_string()
    }
}

fn check_host(target: &str, host: &str) -> Result<(), InvalidTarget> {
    if host.contains('[') {
        return Err(InvalidTarget::malformed(target, "unexpected '[' in address"));
    }
    if host.contains(']') {
        return Err(InvalidTarget::malformed(target, "unexpected ']' in address"));
    }
    Ok(())
}

fn check_port(target: &str, port: &str) -> Result<(), InvalidTarget> {
    if port.contains('[') || port.contains(']') {
        return Err(InvalidTarget::malformed(target, "unexpected bracket in port"));
    }
    Ok(())
}
