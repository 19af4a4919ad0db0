// # Record Store Trait
//
// Defines the interface for reading and mutating the A records of one zone.
//
// ## Implementations
//
// - AWS Route53: `svcdns-store-route53` crate
// - In-memory: `svcdns_core::store::MemoryRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use svcdns_core::{RecordStore, ServiceName};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//     let service = ServiceName::from("api");
//
//     store.upsert(&service, &"10.0.0.1".into()).await?;
//
//     let observed = store.list_records(&service).await?;
//     if let Some(handle) = observed.handle(&"10.0.0.1".into()) {
//         store.delete(handle).await?;
//     }
//
//     Ok(())
// }
// ```

use crate::types::{Address, ObservedSet, RecordHandle, ServiceName, ZoneId, ZoneName};
use async_trait::async_trait;

/// Trait for record store implementations
///
/// A store is bound to exactly one zone. Its zone name is resolved once when
/// the store is constructed and cached for the store's lifetime; a store that
/// cannot resolve its zone must fail construction.
///
/// # Record Shape
///
/// Every record a store manages is an A record named
/// `<service>.<zone name>` whose single value is the endpoint address. The
/// address doubles as the record's discriminator (set identifier), so many
/// weighted records can share one name.
///
/// # Idempotency
///
/// [`RecordStore::upsert`] must be a create-or-update keyed by address:
/// upserting an address that is already published overwrites it rather than
/// adding a duplicate.
///
/// # Handles
///
/// Handles returned by [`RecordStore::list_records`] are only valid for the
/// tick that produced them. Callers must not keep them across ticks.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Identifier of the zone this store manages
    fn zone_id(&self) -> &ZoneId;

    /// Cached fully-qualified name of the zone
    fn zone_name(&self) -> &ZoneName;

    /// List the addresses published for `service` with their handles
    ///
    /// # Returns
    ///
    /// - `Ok(ObservedSet)`: Published A records named `<service>.<zone>`
    /// - `Err(Error::Store)`: If the provider could not be queried
    async fn list_records(&self, service: &ServiceName) -> Result<ObservedSet, crate::Error>;

    /// Create or overwrite the record publishing `address` for `service`
    async fn upsert(&self, service: &ServiceName, address: &Address) -> Result<(), crate::Error>;

    /// Delete the record described by `handle`
    async fn delete(&self, handle: &RecordHandle) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
///
/// Construction is async because it resolves the zone name.
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore bound to `zone`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: A store with its zone name resolved
    /// - `Err(Error)`: If the zone cannot be resolved (startup-fatal)
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
        zone: &ZoneId,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
