//! Plugin-based adapter registry
//!
//! The registry allows endpoint sources and record stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use svcdns_core::AdapterRegistry;
//!
//! let registry = AdapterRegistry::with_builtin();
//! svcdns_source_consul::register(&registry);
//! svcdns_store_route53::register(&registry);
//!
//! let source = registry.create_source(&config.source)?;
//! let stores = registry.create_stores(&config.store, &config.zones).await?;
//! ```
//!
//! ## Registration
//!
//! Adapter crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &AdapterRegistry) {
//!     registry.register_store("route53", Box::new(Route53Factory));
//! }
//! ```

use crate::config::{SourceConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::MemoryStoreFactory;
use crate::traits::{EndpointSource, EndpointSourceFactory, RecordStore, RecordStoreFactory};
use crate::types::ZoneId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Adapter registry for plugin-based source and store creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct AdapterRegistry {
    /// Registered endpoint source factories
    sources: RwLock<HashMap<String, Arc<dyn EndpointSourceFactory>>>,

    /// Registered record store factories
    stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the adapters shipped in this crate
    ///
    /// Registers the `memory` record store.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry
    }

    /// Register an endpoint source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "consul")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn EndpointSourceFactory>) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), Arc::from(factory));
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "route53", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create an endpoint source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn EndpointSource>)`: Created source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn EndpointSource>> {
        let source_type = config.type_name();
        let factory = {
            let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
            sources
                .get(source_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?
        };

        factory.create(config)
    }

    /// Create a record store bound to `zone`
    ///
    /// This resolves the zone name; failure here is startup-fatal.
    pub async fn create_store(&self, config: &StoreConfig, zone: &ZoneId) -> Result<Box<dyn RecordStore>> {
        let store_type = config.type_name();
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        // Lock is released before the async create
        let store = factory.create(config, zone).await?;
        info!(
            store = store.store_name(),
            zone = %store.zone_id(),
            zone_name = %store.zone_name(),
            "Record store ready"
        );
        Ok(store)
    }

    /// Create one record store per zone, failing on the first zone that cannot be resolved
    pub async fn create_stores(
        &self,
        config: &StoreConfig,
        zones: &[ZoneId],
    ) -> Result<Vec<Arc<dyn RecordStore>>> {
        let mut stores = Vec::with_capacity(zones.len());
        for zone in zones {
            stores.push(Arc::from(self.create_store(config, zone).await?));
        }
        Ok(stores)
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
