//! Minimal embedding example for dnswatch-core
//!
//! This example demonstrates using dnswatch-core as a library in a custom
//! application: an in-memory lookup table stands in for DNS, and a custom
//! consumer keeps the current address list for a pretend load balancer.
//! The resolver lifecycle is fully managed by the application.

use dnswatch_core::traits::{Address, ClientConn, State, StaticLookupFactory};
use dnswatch_core::{Builder, Error, MemoryLookup, ResolverConfig, Result, Target};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

/// Consumer holding the addresses a balancer would pick from
struct EmbeddedBalancer {
    name: &'static str,
    backends: Mutex<Vec<Address>>,
    updated_tx: mpsc::UnboundedSender<usize>,
}

impl EmbeddedBalancer {
    fn new(name: &'static str) -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (updated_tx, updated_rx) = mpsc::unbounded_channel();
        let balancer = Self {
            name,
            backends: Mutex::new(Vec::new()),
            updated_tx,
        };
        (Arc::new(balancer), updated_rx)
    }

    fn backends(&self) -> Vec<String> {
        self.backends
            .lock()
            .map(|b| b.iter().map(|a| a.addr.clone()).collect())
            .unwrap_or_default()
    }
}

impl ClientConn for EmbeddedBalancer {
    fn update_state(&self, state: State) -> Result<()> {
        let count = state.addresses.len();
        let mut backends = self
            .backends
            .lock()
            .map_err(|_| Error::rejected("backend list poisoned"))?;
        *backends = state.addresses;
        println!("[{}] {} backend(s)", self.name, count);
        let _ = self.updated_tx.send(count);
        Ok(())
    }

    fn report_error(&self, error: Error) {
        // Keep serving the previous list.
        println!("[{}] resolution failed: {}", self.name, error);
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

async fn wait_update(rx: &mut mpsc::UnboundedReceiver<usize>) -> Option<usize> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    println!("=== Embedded dnswatch-core Example ===\n");

    // Lookup tables the application controls
    let lookup = MemoryLookup::new();
    lookup
        .set_host("backends.internal", vec![ip("10.0.0.1"), ip("10.0.0.2")])
        .await;

    // No rate limiting for the example
    let config = ResolverConfig::new().with_min_resolution_interval_secs(0);
    let builder = Builder::new(
        config,
        Arc::new(StaticLookupFactory::new(Arc::new(lookup.clone()))),
    );

    println!("1. Resolving backends.internal:8080...");
    let (balancer, mut updates) = EmbeddedBalancer::new("balancer");
    let resolver = builder.build(Target::new("backends.internal:8080"), balancer.clone())?;
    wait_update(&mut updates).await;
    println!("   backends: {:?}\n", balancer.backends());

    println!("2. Scaling out and asking for a refresh...");
    lookup
        .set_host(
            "backends.internal",
            vec![ip("10.0.0.1"), ip("10.0.0.2"), ip("10.0.0.3")],
        )
        .await;
    resolver.resolve_now();
    wait_update(&mut updates).await;
    println!("   backends: {:?}\n", balancer.backends());

    println!("3. IP literals need no lookups...");
    let (direct, mut direct_updates) = EmbeddedBalancer::new("direct");
    let literal = builder.build(Target::new("[::1]:9000"), direct.clone())?;
    wait_update(&mut direct_updates).await;
    println!("   backends: {:?}\n", direct.backends());

    println!("4. Closing sessions...");
    resolver.close_and_wait().await;
    literal.close();
    println!("   phase: {:?}", resolver.phase());

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Lookup service and consumer are supplied by the application");
    println!("- No global state");
    println!("- Sessions stop when closed, not when the process exits");

    Ok(())
}
