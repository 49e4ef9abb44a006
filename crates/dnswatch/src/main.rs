// # dnswatch - DNS Target Watcher
//
// Thin command-line shell over dnswatch-core:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Building one resolver session backed by hickory-resolver
// 4. Printing every state update and lookup error until told to stop
//
// No resolution logic lives here; parsing, rate limiting, backoff and the
// watcher loop all belong to dnswatch-core.
//
// ## Configuration
//
// - `DNSWATCH_TARGET`: Target to watch (`host[:port]`, IP literal, or
//   `dns://authority/host[:port]`). Required.
// - `DNSWATCH_AUTHORITY`: DNS server to query instead of the system resolver
// - `DNSWATCH_ENABLE_SRV`: Also expand `_grpclb._tcp` SRV records (true/false)
// - `DNSWATCH_MIN_RESOLUTION_INTERVAL_SECS`: Rate limit for re-resolution
//   requests (default 30)
// - `DNSWATCH_REFRESH_INTERVAL_SECS`: Re-resolve on a timer as well
// - `DNSWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DNSWATCH_OUTPUT`: text or json (default text)
//
// ## Signals
//
// - `SIGHUP`: request an immediate re-resolution (rate limited)
// - `SIGTERM` / `SIGINT`: close the session and exit
//
// ## Example
//
// ```bash
// export DNSWATCH_TARGET=example.com:443
// export DNSWATCH_REFRESH_INTERVAL_SECS=60
// export DNSWATCH_OUTPUT=json
//
// dnswatch
// ```

use anyhow::{Context, Result};
use dnswatch_core::{Builder, ChannelClientConn, ResolverConfig, ResolverEvent, State, Target};
use dnswatch_hickory::HickoryLookupFactory;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// How long the session may take to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WatchExitCode> for ExitCode {
    fn from(code: WatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// How events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    target: String,
    authority: Option<String>,
    enable_srv: bool,
    min_resolution_interval_secs: Option<u64>,
    refresh_interval_secs: Option<u64>,
    log_level: String,
    output: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            target: env::var("DNSWATCH_TARGET").context("DNSWATCH_TARGET is not set")?,
            authority: env::var("DNSWATCH_AUTHORITY").ok().filter(|s| !s.is_empty()),
            enable_srv: env::var("DNSWATCH_ENABLE_SRV")
                .ok()
                .map(|s| parse_bool("DNSWATCH_ENABLE_SRV", &s))
                .transpose()?
                .unwrap_or(false),
            min_resolution_interval_secs: parse_secs("DNSWATCH_MIN_RESOLUTION_INTERVAL_SECS")?,
            refresh_interval_secs: parse_secs("DNSWATCH_REFRESH_INTERVAL_SECS")?,
            log_level: env::var("DNSWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            output: env::var("DNSWATCH_OUTPUT").unwrap_or_else(|_| "text".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// The target itself is parsed by the resolver at build time; only
    /// presence is checked here.
    fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            anyhow::bail!(
                "DNSWATCH_TARGET cannot be empty. \
                Set it via: export DNSWATCH_TARGET=example.com:443"
            );
        }

        if let Some(interval) = self.min_resolution_interval_secs
            && interval > 3600
        {
            anyhow::bail!(
                "DNSWATCH_MIN_RESOLUTION_INTERVAL_SECS must be at most 3600 seconds. Got: {}",
                interval
            );
        }

        if let Some(interval) = self.refresh_interval_secs
            && !(1..=86400).contains(&interval)
        {
            anyhow::bail!(
                "DNSWATCH_REFRESH_INTERVAL_SECS must be between 1 and 86400 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.output_format()?;
        Ok(())
    }

    fn output_format(&self) -> Result<OutputFormat> {
        match self.output.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => anyhow::bail!(
                "DNSWATCH_OUTPUT '{}' is not valid. Valid formats: text, json",
                self.output
            ),
        }
    }

    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::new()
            .with_srv_lookups(self.enable_srv)
            .with_refresh_interval_secs(self.refresh_interval_secs);
        if let Some(secs) = self.min_resolution_interval_secs {
            config = config.with_min_resolution_interval_secs(secs);
        }
        config
    }

    fn target(&self) -> Target {
        let target = Target::from_uri(self.target.trim());
        match &self.authority {
            Some(authority) => target.with_authority(authority.clone()),
            None => target,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
    }
}

fn parse_secs(name: &str) -> Result<Option<u64>> {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds. Got: {}", name, s))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only events.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    info!("Starting dnswatch for {}", config.target);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatchExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(config).await {
            Ok(()) => WatchExitCode::CleanShutdown,
            Err(e) if e.is::<dnswatch_core::Error>() => {
                error!("Failed to start resolver: {:#}", e);
                WatchExitCode::ConfigError
            }
            Err(e) => {
                error!("dnswatch error: {:#}", e);
                WatchExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Watch the configured target until a shutdown signal arrives
async fn run(config: Config) -> Result<()> {
    let output = config.output_format()?;
    let mut signals = Signals::install()?;

    let builder = Builder::new(
        config.resolver_config(),
        Arc::new(HickoryLookupFactory::default()),
    );
    let (consumer, mut events) = ChannelClientConn::new();
    let resolver = builder.build(config.target(), Arc::new(consumer))?;
    info!("Watching {}", resolver.target());

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                ControlSignal::Refresh => {
                    info!("Received SIGHUP, requesting re-resolution");
                    resolver.resolve_now();
                }
                ControlSignal::Shutdown(name) => {
                    info!("Received shutdown signal: {}", name);
                    break;
                }
            },
            event = events.next() => match event {
                Some(event) => print_event(&event, output)?,
                None => {
                    warn!("Event stream ended unexpectedly");
                    break;
                }
            },
        }
    }

    tokio::time::timeout(SHUTDOWN_TIMEOUT, resolver.close_and_wait())
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))?;
    info!("Resolver closed");
    Ok(())
}

fn print_event(event: &ResolverEvent, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Text => match event {
            ResolverEvent::StateUpdated(state) => println!("{}", render_state(state)),
            ResolverEvent::Error(e) => println!("error: {}", e),
        },
        OutputFormat::Json => {
            let line = match event {
                ResolverEvent::StateUpdated(state) => {
                    serde_json::json!({ "event": "update", "state": state })
                }
                ResolverEvent::Error(e) => {
                    serde_json::json!({ "event": "error", "error": e.to_string() })
                }
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    Ok(())
}

fn render_state(state: &State) -> String {
    let mut parts = vec![format!(
        "addresses: [{}]",
        state
            .addresses
            .iter()
            .map(|a| a.addr.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    )];
    if !state.balancer_addresses.is_empty() {
        let balancers: Vec<String> = state
            .balancer_addresses
            .iter()
            .map(|a| match &a.server_name {
                Some(name) => format!("{} ({})", a.addr, name),
                None => a.addr.clone(),
            })
            .collect();
        parts.push(format!("balancers: [{}]", balancers.join(", ")));
    }
    if let Some(service_config) = &state.service_config {
        parts.push(format!("service config: {}", service_config));
    }
    parts.join(" ")
}

/// What a received signal asks the watcher to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlSignal {
    Refresh,
    Shutdown(&'static str),
}

/// Signal handlers for SIGHUP, SIGTERM and SIGINT
#[cfg(unix)]
struct Signals {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?,
            terminate: signal(SignalKind::terminate())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?,
            interrupt: signal(SignalKind::interrupt())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?,
        })
    }

    async fn recv(&mut self) -> ControlSignal {
        tokio::select! {
            _ = self.hangup.recv() => ControlSignal::Refresh,
            _ = self.terminate.recv() => ControlSignal::Shutdown("SIGTERM"),
            _ = self.interrupt.recv() => ControlSignal::Shutdown("SIGINT"),
        }
    }
}

/// Fallback for non-Unix platforms: CTRL-C only
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> ControlSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to wait for CTRL-C: {}", e);
        }
        ControlSignal::Shutdown("SIGINT")
    }
}
