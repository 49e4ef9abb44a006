//! Configuration types for the resolver
//!
//! Everything that used to be process-wide (default ports, SRV toggle,
//! re-resolution rate, backoff schedule) lives here and is handed to the
//! [`Builder`](crate::resolver::Builder) once.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Port applied when a target omits one
    #[serde(default = "default_port")]
    pub default_port: String,

    /// Port applied when a custom authority omits one
    #[serde(default = "default_authority_port")]
    pub default_authority_port: String,

    /// Query SRV records and expose the expansion as balancer addresses
    #[serde(default)]
    pub enable_srv_lookups: bool,

    /// Service label of the synthesized SRV name (`_service._proto.host`)
    #[serde(default = "default_srv_service")]
    pub srv_service: String,

    /// Protocol label of the synthesized SRV name
    #[serde(default = "default_srv_proto")]
    pub srv_proto: String,

    /// Skip the TXT service-config lookup
    #[serde(default)]
    pub disable_service_config: bool,

    /// Minimum interval between two explicitly triggered resolutions (in seconds)
    ///
    /// Set to 0 to disable rate limiting (tests only).
    #[serde(default = "default_min_resolution_interval_secs")]
    pub min_resolution_interval_secs: u64,

    /// Re-resolve on its own after this many seconds without a trigger
    ///
    /// `None` blocks until an explicit trigger arrives.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,

    /// Wait schedule after failed or rejected cycles
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl ResolverConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            default_port: default_port(),
            default_authority_port: default_authority_port(),
            enable_srv_lookups: false,
            srv_service: default_srv_service(),
            srv_proto: default_srv_proto(),
            disable_service_config: false,
            min_resolution_interval_secs: default_min_resolution_interval_secs(),
            refresh_interval_secs: None,
            backoff: BackoffConfig::default(),
        }
    }

    /// Enable or disable SRV lookups
    pub fn with_srv_lookups(mut self, enabled: bool) -> Self {
        self.enable_srv_lookups = enabled;
        self
    }

    /// Set the minimum re-resolution interval
    pub fn with_min_resolution_interval_secs(mut self, secs: u64) -> Self {
        self.min_resolution_interval_secs = secs;
        self
    }

    /// Set the periodic refresh interval
    pub fn with_refresh_interval_secs(mut self, secs: Option<u64>) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Enable or disable the TXT service-config lookup
    pub fn with_service_config(mut self, enabled: bool) -> Self {
        self.disable_service_config = !enabled;
        self
    }

    /// Replace the backoff schedule
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Minimum re-resolution interval as a `Duration`
    pub fn min_resolution_interval(&self) -> Duration {
        Duration::from_secs(self.min_resolution_interval_secs)
    }

    /// Periodic refresh interval as a `Duration`
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_port.is_empty() {
            return Err(crate::Error::config("default_port cannot be empty"));
        }
        if self.default_authority_port.is_empty() {
            return Err(crate::Error::config("default_authority_port cannot be empty"));
        }
        if self.enable_srv_lookups && (self.srv_service.is_empty() || self.srv_proto.is_empty()) {
            return Err(crate::Error::config(
                "srv_service and srv_proto are required when SRV lookups are enabled",
            ));
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(crate::Error::config("refresh_interval_secs must be > 0"));
        }

        self.backoff.validate()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded exponential backoff schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First wait after a failed cycle (in milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied per consecutive failure
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomisation factor in `[0, 1]`; 0 gives a deterministic schedule
    #[serde(default)]
    pub jitter: f64,

    /// Upper bound on any single wait (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    /// Validate the backoff schedule
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(self.multiplier >= 1.0) {
            return Err(crate::Error::config("backoff multiplier must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(crate::Error::config("backoff jitter must be within [0, 1]"));
        }
        if self.base_delay_ms == 0 {
            return Err(crate::Error::config("backoff base_delay_ms must be > 0"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(crate::Error::config(
                "backoff base_delay_ms cannot exceed max_delay_ms",
            ));
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            jitter: 0.0,
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_port() -> String {
    "443".to_string()
}

fn default_authority_port() -> String {
    "53".to_string()
}

fn default_srv_service() -> String {
    "grpclb".to_string()
}

fn default_srv_proto() -> String {
    "tcp".to_string()
}

fn default_min_resolution_interval_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    1.6
}

fn default_max_delay_ms() -> u64 {
    120_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let config: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.default_port, "443");
        assert_eq!(config.default_authority_port, "53");
        assert_eq!(config.min_resolution_interval(), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: ResolverConfig = serde_json::from_str(
            r#"{"enable_srv_lookups": true, "backoff": {"base_delay_ms": 10}}"#,
        )
        .unwrap();
        assert!(config.enable_srv_lookups);
        assert_eq!(config.srv_service, "grpclb");
        assert_eq!(config.backoff.base_delay_ms, 10);
        assert_eq!(config.backoff.max_delay_ms, 120_000);
    }

    #[test]
    fn rejects_bad_values() {
        let config = ResolverConfig::new().with_refresh_interval_secs(Some(0));
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::new();
        config.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::new();
        config.backoff.jitter = 1.5;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::new();
        config.default_port.clear();
        assert!(config.validate().is_err());

        let config = ResolverConfig::new().with_backoff(BackoffConfig {
            base_delay_ms: 0,
            multiplier: 1.6,
            jitter: 0.0,
            max_delay_ms: 0,
        });
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::new();
        config.backoff.base_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::new();
        config.backoff.base_delay_ms = 5_000;
        config.backoff.max_delay_ms = 1_000;
        assert!(config.validate().is_err());
    }
}
