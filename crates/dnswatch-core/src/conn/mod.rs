//! Built-in consumer implementations

pub mod channel;

pub use channel::{ChannelClientConn, ResolverEvent};
