//! Error types for the dnswatch resolver
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// A target or authority string that cannot be parsed
///
/// Returned synchronously from `Builder::build`; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTarget {
    /// The target string is empty
    #[error("missing address")]
    MissingAddress,

    /// The target ends with a port separator but carries no port
    #[error("missing port after port-separator colon")]
    EndsWithColon,

    /// Unbalanced or misplaced brackets
    #[error("invalid target address {target}: {reason}")]
    MalformedBracket {
        /// The offending input
        target: String,
        /// What is wrong with it
        reason: String,
    },
}

impl InvalidTarget {
    pub(crate) fn malformed(target: &str, reason: &str) -> Self {
        Self::MalformedBracket {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Classification of a lookup-service failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupErrorKind {
    /// The name has no records of the requested type
    NotFound,
    /// The query timed out
    Timeout,
    /// A transient failure (network, server failure)
    Temporary,
    /// Anything else
    Other,
}

/// Failure reported by a [`LookupService`](crate::traits::LookupService)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lookup {name}: {message}")]
pub struct LookupError {
    /// Failure class
    pub kind: LookupErrorKind,
    /// The queried name
    pub name: String,
    /// Human-readable detail
    pub message: String,
}

impl LookupError {
    /// Create a lookup error of the given kind
    pub fn new(kind: LookupErrorKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// The name exists but has no records of the requested type, or does not exist
    pub fn not_found(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LookupErrorKind::NotFound, name, message)
    }

    /// Create a timeout error
    pub fn timeout(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LookupErrorKind::Timeout, name, message)
    }

    /// Create a transient error
    pub fn temporary(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LookupErrorKind::Temporary, name, message)
    }

    /// Create an unclassified error
    pub fn other(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LookupErrorKind::Other, name, message)
    }

    /// True when the failure means "no such records"
    pub fn is_not_found(&self) -> bool {
        self.kind == LookupErrorKind::NotFound
    }

    /// True for timeouts and transient failures
    pub fn is_temporary(&self) -> bool {
        matches!(self.kind, LookupErrorKind::Timeout | LookupErrorKind::Temporary)
    }
}

/// Core error type for the resolver
#[derive(Error, Debug)]
pub enum Error {
    /// Target or authority could not be parsed
    #[error("invalid target: {0}")]
    InvalidTarget(#[from] InvalidTarget),

    /// A lookup of the given record type failed
    #[error("dns: {record} record lookup error: {source}")]
    Lookup {
        /// Record type that was queried ("A", "SRV", "TXT")
        record: &'static str,
        /// Underlying lookup failure
        #[source]
        source: LookupError,
    },

    /// The consumer refused a state update
    #[error("resolver state rejected: {0}")]
    Rejected(String),

    /// The lookup-service factory could not produce a service
    #[error("failed to build lookup service: {0}")]
    Build(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a lookup failure for the given record type
    pub fn lookup(record: &'static str, source: LookupError) -> Self {
        Self::Lookup { record, source }
    }

    /// Create a rejection error (returned by consumers from `update_state`)
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create a lookup-service construction error
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The lookup failure carried by this error, if any
    pub fn as_lookup(&self) -> Option<&LookupError> {
        match self {
            Self::Lookup { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
