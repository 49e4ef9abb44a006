//! Built-in lookup service implementations
//!
//! - [`MemoryLookup`]: in-memory tables for tests, demos and static setups

pub mod memory;

pub use memory::MemoryLookup;
