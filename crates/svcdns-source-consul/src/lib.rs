// # Consul Endpoint Source
//
// This crate provides the Consul-backed endpoint source for svcdns.
//
// ## Purpose
//
// Answers "which addresses are healthy for service X right now" from the
// Consul health API. Only instances whose checks are all passing are listed.
//
// ## Server Selection
//
// The configured addresses are resolved through DNS on every call, so a
// server set behind a DNS name follows membership changes without restarts.
// The server that answered last is tried first; the others follow in
// configuration order.
//
// ## Address Rule
//
// An instance registered with a service address publishes that address.
// Instances registered without one fall back to their node's address.

use svcdns_core::AdapterRegistry;
use svcdns_core::config::SourceConfig;
use svcdns_core::traits::{EndpointSource, EndpointSourceFactory};
use svcdns_core::{Address, DesiredSet, Error, Result, ServiceName};

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the ACL token
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Settings for one Consul source, fixed at construction
#[derive(Clone)]
pub struct ConsulSourceConfig {
    /// Server addresses (host, IP or host:port)
    pub addresses: Vec<String>,
    /// HTTP API port used when an address carries none
    pub http_port: u16,
    /// Per-request timeout
    pub timeout: Duration,
    /// `http` or `https`
    pub scheme: String,
    /// Datacenter to query
    pub datacenter: Option<String>,
    /// ACL token
    pub token: Option<String>,
}

impl ConsulSourceConfig {
    /// Extract Consul settings from a source configuration
    pub fn from_source_config(config: &SourceConfig) -> Result<Self> {
        config.validate()?;
        match config {
            SourceConfig::Consul {
                addresses,
                http_port,
                timeout_secs,
                scheme,
                datacenter,
                token,
            } => Ok(Self {
                addresses: addresses
                    .iter()
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect(),
                http_port: *http_port,
                timeout: Duration::from_secs(*timeout_secs),
                scheme: scheme.clone(),
                datacenter: datacenter.clone().filter(|dc| !dc.is_empty()),
                token: token.clone().filter(|t| !t.is_empty()),
            }),
            _ => Err(Error::config("Invalid config for Consul source")),
        }
    }
}

impl fmt::Debug for ConsulSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulSourceConfig")
            .field("addresses", &self.addresses)
            .field("http_port", &self.http_port)
            .field("timeout", &self.timeout)
            .field("scheme", &self.scheme)
            .field("datacenter", &self.datacenter)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One entry of `/v1/health/service/<name>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    node: NodeInfo,
    service: ServiceInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfo {
    #[serde(default)]
    node: String,
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceInfo {
    #[serde(default, rename = "ID")]
    id: String,
    #[serde(default)]
    address: String,
}

impl ServiceEntry {
    /// Address to publish for this instance
    fn endpoint(&self) -> Option<&str> {
        let service = self.service.address.trim();
        if !service.is_empty() {
            return Some(service);
        }
        let node = self.node.address.trim();
        (!node.is_empty()).then_some(node)
    }
}

/// Endpoint source backed by the Consul health API
pub struct ConsulEndpointSource {
    config: ConsulSourceConfig,

    /// HTTP client
    client: reqwest::Client,

    /// Server that answered the last successful request
    last_good: Mutex<Option<SocketAddr>>,
}

impl ConsulEndpointSource {
    /// Create a new Consul source
    pub fn new(config: ConsulSourceConfig) -> Result<Self> {
        if config.addresses.is_empty() {
            return Err(Error::config("Consul addresses cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            last_good: Mutex::new(None),
        })
    }

    /// Resolve every configured address, last good server first
    async fn candidates(&self) -> Vec<SocketAddr> {
        let mut resolved: Vec<SocketAddr> = Vec::new();

        for entry in &self.config.addresses {
            match resolve(entry, self.config.http_port).await {
                Ok(addrs) => {
                    for addr in addrs {
                        if !resolved.contains(&addr) {
                            resolved.push(addr);
                        }
                    }
                }
                Err(e) => warn!(address = %entry, error = %e, "Failed to resolve Consul server"),
            }
        }

        let last_good = *self.last_good.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = last_good.and_then(|good| resolved.iter().position(|a| *a == good)) {
            let good = resolved.remove(pos);
            resolved.insert(0, good);
        }

        resolved
    }

    /// Query one server for the passing instances of `service`
    async fn query(&self, server: SocketAddr, service: &ServiceName) -> Result<Vec<ServiceEntry>> {
        let url = format!(
            "{}://{}/v1/health/service/{}",
            self.config.scheme,
            server,
            urlencoding::encode(service.as_str())
        );

        let mut request = self.client.get(&url).query(&[("passing", "true")]);
        if let Some(dc) = &self.config.datacenter {
            request = request.query(&[("dc", dc.as_str())]);
        }
        if let Some(token) = &self.config.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::discovery(service.as_str(), format!("Request to {} failed: {}", server, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            return Err(match status.as_u16() {
                403 => Error::auth(format!("Consul server {} rejected the token: {}", server, body)),
                429 => Error::rate_limited(format!("Consul server {} is rate limiting", server)),
                code if code >= 500 => Error::http(format!("Consul server {} returned {}: {}", server, status, body)),
                _ => Error::discovery(service.as_str(), format!("Consul server {} returned {}: {}", server, status, body)),
            });
        }

        response
            .json::<Vec<ServiceEntry>>()
            .await
            .map_err(|e| Error::discovery(service.as_str(), format!("Invalid response from {}: {}", server, e)))
    }

    fn remember(&self, server: SocketAddr) {
        *self.last_good.lock().unwrap_or_else(PoisonError::into_inner) = Some(server);
    }
}

/// Resolve a configured address to socket addresses
///
/// Accepts an IP, an IP:port, a host or a host:port.
async fn resolve(entry: &str, default_port: u16) -> std::io::Result<Vec<SocketAddr>> {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }

    let has_port = entry
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    let addrs: Vec<SocketAddr> = if has_port {
        tokio::net::lookup_host(entry).await?.collect()
    } else {
        tokio::net::lookup_host((entry, default_port)).await?.collect()
    };
    Ok(addrs)
}

#[async_trait::async_trait]
impl EndpointSource for ConsulEndpointSource {
    async fn list_endpoints(&self, service: &ServiceName) -> Result<DesiredSet> {
        let candidates = self.candidates().await;
        if candidates.is_empty() {
            return Err(Error::discovery(
                service.as_str(),
                "no Consul server address could be resolved",
            ));
        }

        let mut last_error = None;
        for server in candidates {
            match self.query(server, service).await {
                Ok(entries) => {
                    self.remember(server);

                    let mut endpoints = DesiredSet::new();
                    for entry in &entries {
                        match entry.endpoint() {
                            Some(address) => {
                                endpoints.insert(Address::from(address));
                            }
                            None => warn!(
                                service = %service,
                                node = %entry.node.node,
                                instance = %entry.service.id,
                                "Instance has neither a service nor a node address, ignoring"
                            ),
                        }
                    }

                    debug!(
                        service = %service,
                        server = %server,
                        instances = entries.len(),
                        endpoints = endpoints.len(),
                        "Listed healthy endpoints"
                    );
                    return Ok(endpoints);
                }
                Err(e) => {
                    warn!(service = %service, server = %server, error = %e, "Consul server failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::discovery(service.as_str(), "no Consul server answered")))
    }

    fn source_name(&self) -> &'static str {
        "consul"
    }
}

/// Factory for creating Consul endpoint sources
pub struct ConsulFactory;

impl EndpointSourceFactory for ConsulFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn EndpointSource>> {
        let config = ConsulSourceConfig::from_source_config(config)?;
        Ok(Box::new(ConsulEndpointSource::new(config)?))
    }
}

/// Register the Consul source with a registry
pub fn register(registry: &AdapterRegistry) {
    registry.register_source("consul", Box::new(ConsulFactory));
}
