//! Configuration types for the sync system
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`SyncConfig`] is built once at startup and never mutated afterwards;
//! adapters receive the part they need at construction time.

use crate::types::{ServiceName, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Endpoint source configuration
    pub source: SourceConfig,

    /// Record store configuration
    pub store: StoreConfig,

    /// Services to synchronize
    pub services: Vec<ServiceName>,

    /// Zones to synchronize every service into
    pub zones: Vec<ZoneId>,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.services.is_empty() {
            return Err(crate::Error::config("No services configured"));
        }
        if self.zones.is_empty() {
            return Err(crate::Error::config("No zones configured"));
        }

        check_unique("service", self.services.iter().map(ServiceName::as_str))?;
        check_unique("zone", self.zones.iter().map(ZoneId::as_str))?;

        self.source.validate()?;
        self.store.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

fn check_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<(), crate::Error> {
    let mut seen = BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(crate::Error::config(format!("Empty {} name", kind)));
        }
        if !seen.insert(name) {
            return Err(crate::Error::config(format!("Duplicate {} name: {}", kind, name)));
        }
    }
    Ok(())
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Endpoint source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Consul health API
    Consul {
        /// Server addresses (host, IP or host:port)
        addresses: Vec<String>,
        /// HTTP API port used when an address carries none
        #[serde(default = "default_consul_http_port")]
        http_port: u16,
        /// Per-request timeout in seconds
        #[serde(default = "default_consul_timeout_secs")]
        timeout_secs: u64,
        /// `http` or `https`
        #[serde(default = "default_consul_scheme")]
        scheme: String,
        /// Datacenter to query (agent default when unset)
        #[serde(default)]
        datacenter: Option<String>,
        /// ACL token
        #[serde(default)]
        token: Option<String>,
    },

    /// Custom endpoint source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Consul {
                addresses,
                timeout_secs,
                scheme,
                ..
            } => {
                if addresses.iter().all(|a| a.trim().is_empty()) {
                    return Err(crate::Error::config("Consul addresses cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("Consul timeout must be > 0"));
                }
                if scheme != "http" && scheme != "https" {
                    return Err(crate::Error::config(format!(
                        "Consul scheme must be http or https, got {}",
                        scheme
                    )));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Consul { .. } => "consul",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// AWS Route53
    Route53 {
        /// Shape of published records
        #[serde(default)]
        records: RecordDefaults,
        /// API endpoint override
        #[serde(default)]
        endpoint: Option<String>,
        /// Log intended changes instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// In-memory zone (not persistent)
    Memory {
        /// Shape of published records
        #[serde(default)]
        records: RecordDefaults,
    },

    /// Custom record store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Route53 { records, .. } | StoreConfig::Memory { records } => {
                records.validate()
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Route53 { .. } => "route53",
            StoreConfig::Memory { .. } => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Largest routing weight a weighted record set accepts
pub const MAX_RECORD_WEIGHT: u64 = 255;

/// TTL and weight stamped on every upserted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefaults {
    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Relative routing weight
    #[serde(default = "default_weight")]
    pub weight: u64,
}

impl RecordDefaults {
    /// Validate record defaults
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.weight > MAX_RECORD_WEIGHT {
            return Err(crate::Error::config(format!(
                "Record weight must be between 0 and {}, got {}",
                MAX_RECORD_WEIGHT, self.weight
            )));
        }
        Ok(())
    }
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            weight: default_weight(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between passes (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound for any single adapter call (in seconds)
    ///
    /// A call that exceeds it fails with a timeout error and the pair it
    /// belongs to is treated as failed for this tick.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// How many zones of one service may be reconciled concurrently
    ///
    /// 1 processes zones strictly one after another.
    #[serde(default = "default_max_concurrent_zones")]
    pub max_concurrent_zones: usize,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate scheduler settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Call timeout must be > 0"));
        }
        if self.max_concurrent_zones == 0 {
            return Err(crate::Error::config("max_concurrent_zones must be >= 1"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be >= 1"));
        }
        Ok(())
    }

    /// Interval between passes
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Upper bound for any single adapter call
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            max_concurrent_zones: default_max_concurrent_zones(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_consul_http_port() -> u16 {
    8500
}

fn default_consul_timeout_secs() -> u64 {
    5
}

fn default_consul_scheme() -> String {
    "http".to_string()
}

fn default_ttl() -> u32 {
    60
}

fn default_weight() -> u64 {
    100
}

fn default_interval_secs() -> u64 {
    20
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_zones() -> usize {
    1
}

fn default_event_channel_capacity() -> usize {
    1000
}
