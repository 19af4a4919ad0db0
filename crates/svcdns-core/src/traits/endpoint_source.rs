// # Endpoint Source Trait
//
// Defines the interface for listing the healthy endpoints of a service.
//
// ## Implementations
//
// - Consul health API: `svcdns-source-consul` crate
//
// ## Usage
//
// ```rust,ignore
// use svcdns_core::{EndpointSource, ServiceName};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* EndpointSource implementation */;
//
//     let desired = source.list_endpoints(&ServiceName::from("api")).await?;
//     for address in &desired {
//         println!("healthy: {}", address);
//     }
//
//     Ok(())
// }
// ```

use crate::types::{DesiredSet, ServiceName};
use async_trait::async_trait;

/// Trait for endpoint source implementations
///
/// A source answers one question: which addresses are healthy for a service
/// right now. It holds no opinion about DNS.
///
/// # Empty Results
///
/// `Ok` with an empty set means the service has zero healthy instances. That
/// is a legitimate convergence target and drives deletion of every published
/// record. Sources must only return `Err` when they could not find out
/// (backend unreachable, malformed response, authentication failure).
///
/// # Deduplication
///
/// The returned value is a set. Instances sharing an address collapse into
/// one entry.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// List the addresses currently reported healthy for `service`
    ///
    /// # Returns
    ///
    /// - `Ok(DesiredSet)`: Healthy addresses (possibly empty)
    /// - `Err(Error::Discovery)`: If the backend could not be queried
    async fn list_endpoints(&self, service: &ServiceName) -> Result<DesiredSet, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing endpoint sources from configuration
pub trait EndpointSourceFactory: Send + Sync {
    /// Create an EndpointSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this source type
    ///
    /// # Returns
    ///
    /// A boxed EndpointSource trait object
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn EndpointSource>, crate::Error>;
}
