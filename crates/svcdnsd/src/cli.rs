// Command line and environment configuration
//
// Every flag has an `SVCDNS_*` environment fallback. Values are checked here
// and turned into one immutable `SyncConfig`; nothing re-reads the
// environment afterwards.

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use svcdns_core::config::{RecordDefaults, split_list};
use svcdns_core::{SchedulerConfig, ServiceName, SourceConfig, StoreConfig, SyncConfig, ZoneId};

/// Record store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// AWS Route53 hosted zones
    Route53,
    /// In-process zones, lost on exit
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Keep DNS A records in sync with Consul service health
#[derive(Debug, Parser)]
#[command(name = "svcdnsd", version, about)]
pub struct Args {
    /// Comma-separated Consul server addresses (host, IP or host:port)
    #[arg(long, env = "SVCDNS_CONSUL_ADDRESSES")]
    pub consul_addresses: Option<String>,

    /// Consul HTTP API port
    #[arg(long, env = "SVCDNS_CONSUL_HTTP_PORT", default_value_t = 8500)]
    pub consul_http_port: u16,

    /// Consul request timeout in seconds
    #[arg(long, env = "SVCDNS_CONSUL_HTTP_TIMEOUT", default_value_t = 5)]
    pub consul_http_timeout: u64,

    /// Consul API scheme (http or https)
    #[arg(long, env = "SVCDNS_CONSUL_SCHEME", default_value = "http")]
    pub consul_scheme: String,

    /// Consul datacenter to query
    #[arg(long, env = "SVCDNS_CONSUL_DATACENTER")]
    pub consul_datacenter: Option<String>,

    /// Consul ACL token
    #[arg(long, env = "SVCDNS_CONSUL_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// Comma-separated service names to publish
    #[arg(long, env = "SVCDNS_SERVICES")]
    pub services: Option<String>,

    /// Comma-separated hosted zone ids to publish into
    #[arg(long, env = "SVCDNS_ZONE_IDS")]
    pub zone_ids: Option<String>,

    /// Record store backend
    #[arg(long, env = "SVCDNS_STORE", value_enum, default_value_t = StoreKind::Route53)]
    pub store: StoreKind,

    /// Route53 API endpoint override
    #[arg(long, env = "SVCDNS_ROUTE53_ENDPOINT")]
    pub route53_endpoint: Option<String>,

    /// TTL of published records in seconds
    #[arg(long, env = "SVCDNS_RECORD_TTL", default_value_t = 60)]
    pub record_ttl: u32,

    /// Weight of published records (0-255)
    #[arg(long, env = "SVCDNS_RECORD_WEIGHT", default_value_t = 100)]
    pub record_weight: u64,

    /// Seconds between reconciliation passes
    #[arg(long, env = "SVCDNS_REFRESH_INTERVAL", default_value_t = 20)]
    pub refresh_interval: u64,

    /// Upper bound for any single discovery or DNS call, in seconds
    #[arg(long, env = "SVCDNS_CALL_TIMEOUT", default_value_t = 10)]
    pub call_timeout: u64,

    /// Zones of one service reconciled concurrently
    #[arg(long, env = "SVCDNS_MAX_CONCURRENT_ZONES", default_value_t = 1)]
    pub max_concurrent_zones: usize,

    /// Log changes instead of applying them
    #[arg(long, env = "SVCDNS_DRY_RUN")]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SVCDNS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "SVCDNS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Validate the arguments and build the sync configuration
    pub fn to_config(&self) -> Result<SyncConfig> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => bail!(
                "SVCDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        let addresses = split_list(self.consul_addresses.as_deref().unwrap_or_default());
        if addresses.is_empty() {
            bail!(
                "SVCDNS_CONSUL_ADDRESSES is required. \
                Set it via: --consul-addresses 10.0.0.10,10.0.0.11"
            );
        }

        let services = split_list(self.services.as_deref().unwrap_or_default());
        if services.is_empty() {
            bail!(
                "SVCDNS_SERVICES must contain at least one service. \
                Set it via: --services api,web"
            );
        }

        let zones = split_list(self.zone_ids.as_deref().unwrap_or_default());
        if zones.is_empty() {
            bail!(
                "SVCDNS_ZONE_IDS must contain at least one zone. \
                Set it via: --zone-ids Z0123456789ABC"
            );
        }

        let records = RecordDefaults {
            ttl: self.record_ttl,
            weight: self.record_weight,
        };

        let store = match self.store {
            StoreKind::Route53 => StoreConfig::Route53 {
                records,
                endpoint: self.route53_endpoint.clone(),
                dry_run: self.dry_run,
            },
            StoreKind::Memory => StoreConfig::Memory { records },
        };

        let config = SyncConfig {
            source: SourceConfig::Consul {
                addresses,
                http_port: self.consul_http_port,
                timeout_secs: self.consul_http_timeout,
                scheme: self.consul_scheme.to_lowercase(),
                datacenter: self.consul_datacenter.clone(),
                token: self.consul_token.clone(),
            },
            store,
            services: services.into_iter().map(ServiceName::from).collect(),
            zones: zones.into_iter().map(ZoneId::from).collect(),
            scheduler: SchedulerConfig {
                interval_secs: self.refresh_interval,
                call_timeout_secs: self.call_timeout,
                max_concurrent_zones: self.max_concurrent_zones,
                ..SchedulerConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }
}
