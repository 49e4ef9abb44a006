// # dnswatch-core
//
// Core library for the continuously-updating dnswatch name resolver.
//
// ## Architecture Overview
//
// This library turns an opaque target string into a live list of network
// addresses and keeps it fresh:
// - **Target parsing**: classifies a target as IP literal or hostname, splits
//   host and port, normalises custom authorities
// - **LookupService**: Trait for the injected DNS capability (host, SRV, TXT)
// - **ClientConn**: Trait for the consumer receiving state updates and errors
// - **Clock**: Trait for timer construction, swappable for deterministic tests
// - **RateLimiter / Backoff**: Coalescing of explicit refresh requests and
//   bounded exponential waits after failed cycles
// - **Builder / Resolver**: One background watcher task per resolved target
//
// ## Design Principles
//
// 1. **No global state**: everything a session needs is injected through the
//    `Builder`
// 2. **Single writer**: one watcher task per session, one cycle in flight,
//    consumer callbacks strictly sequential
// 3. **Cancellation everywhere**: every suspension point races the session's
//    close signal
// 4. **Library-First**: the CLI is a thin shell over this crate

pub mod traits;
pub mod target;
pub mod backoff;
pub mod rate_limit;
pub mod resolver;
pub mod config;
pub mod error;
pub mod conn;
pub mod lookup;
pub mod manual_clock;

// Re-export core types for convenience
pub use traits::{Address, ClientConn, Clock, LookupService, LookupServiceFactory, State, TokioClock};
pub use target::Target;
pub use resolver::{Builder, Resolver, ResolverPhase};
pub use config::{BackoffConfig, ResolverConfig};
pub use error::{Error, InvalidTarget, LookupError, LookupErrorKind, Result};
pub use conn::{ChannelClientConn, ResolverEvent};
pub use lookup::MemoryLookup;
pub use manual_clock::{ManualClock, PendingTimer};
