//! Core traits for the resolver
//!
//! This module defines the ports every collaborator plugs into.
//!
//! - [`LookupService`]: Host, SRV and TXT lookups (the DNS capability)
//! - [`LookupServiceFactory`]: Produces lookup services, per authority
//! - [`ClientConn`]: The consumer of resolved state and lookup errors
//! - [`Clock`]: Timer construction for the watcher loop

pub mod lookup_service;
pub mod client_conn;
pub mod clock;

pub use lookup_service::{LookupService, LookupServiceFactory, SrvRecord, StaticLookupFactory};
pub use client_conn::{Address, ClientConn, State};
pub use clock::{Clock, Sleep, TokioClock};
