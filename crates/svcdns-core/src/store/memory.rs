// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Holds one zone's A records in process memory with the same naming and
// upsert semantics as a real provider. Useful for embedding, local dry runs
// against a live discovery backend, and tests.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - The first tick after a restart republishes every healthy endpoint

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{RecordDefaults, StoreConfig};
use crate::traits::{RecordStore, RecordStoreFactory};
use crate::types::{Address, ObservedSet, RecordHandle, ServiceName, ZoneId, ZoneName};
use crate::Error;

/// Records keyed by (record name, set identifier)
type RecordMap = BTreeMap<(String, String), RecordHandle>;

/// In-memory record store implementation
///
/// Cloning the store shares the underlying zone, so a clone kept by the
/// caller observes every change made through a boxed copy.
///
/// # Example
///
/// ```rust,no_run
/// use svcdns_core::store::MemoryRecordStore;
/// use svcdns_core::traits::RecordStore;
/// use svcdns_core::ServiceName;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new("example.com.");
///     let service = ServiceName::from("api");
///
///     store.upsert(&service, &"10.0.0.1".into()).await?;
///
///     let observed = store.list_records(&service).await?;
///     assert!(observed.contains(&"10.0.0.1".into()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    zone_id: ZoneId,
    zone_name: ZoneName,
    defaults: RecordDefaults,
    inner: Arc<RwLock<RecordMap>>,
}

impl MemoryRecordStore {
    /// Create an empty zone whose id and name are both `zone`
    pub fn new(zone: impl Into<String>) -> Self {
        let zone = zone.into();
        Self::with_defaults(ZoneId::new(zone.clone()), ZoneName::new(zone), RecordDefaults::default())
    }

    /// Create an empty zone with explicit id, name and record shape
    pub fn with_defaults(zone_id: ZoneId, zone_name: ZoneName, defaults: RecordDefaults) -> Self {
        Self {
            zone_id,
            zone_name,
            defaults,
            inner: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Get the number of records in the zone
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the zone is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove every record from the zone
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Put an arbitrary record into the zone, bypassing upsert
    ///
    /// Models changes made outside the daemon (manual edits, other tools).
    pub async fn seed(&self, handle: RecordHandle) {
        let key = record_key(&handle);
        self.inner.write().await.insert(key, handle);
    }

    /// Snapshot of every record in the zone
    pub async fn records(&self) -> Vec<RecordHandle> {
        self.inner.read().await.values().cloned().collect()
    }
}

// Plain (non-weighted) record sets have no set identifier; there is at most
// one of them per name.
fn record_key(handle: &RecordHandle) -> (String, String) {
    (handle.name.clone(), handle.set_identifier.clone().unwrap_or_default())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    fn zone_name(&self) -> &ZoneName {
        &self.zone_name
    }

    async fn list_records(&self, service: &ServiceName) -> Result<ObservedSet, Error> {
        let name = service.record_name(&self.zone_name);
        let guard = self.inner.read().await;

        let mut observed = ObservedSet::new();
        for handle in guard.values().filter(|h| h.name == name) {
            for value in &handle.values {
                let mut indexed = handle.clone();
                indexed.address = Address::new(value.clone());
                if !observed.insert(indexed) {
                    debug!(record = %name, address = %value, "Value repeated within one record set");
                }
            }
        }

        Ok(observed)
    }

    async fn upsert(&self, service: &ServiceName, address: &Address) -> Result<(), Error> {
        let handle = RecordHandle::weighted(
            service.record_name(&self.zone_name),
            address.clone(),
            self.defaults.ttl,
            self.defaults.weight,
        );
        let key = record_key(&handle);
        self.inner.write().await.insert(key, handle);
        Ok(())
    }

    async fn delete(&self, handle: &RecordHandle) -> Result<(), Error> {
        let key = record_key(handle);
        let mut guard = self.inner.write().await;
        match guard.remove(&key) {
            Some(_) => Ok(()),
            None => Err(Error::store(
                self.zone_id.as_str(),
                format!("record {} ({}) not found", key.0, key.1),
            )),
        }
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating in-memory stores
///
/// The zone id doubles as the zone name.
pub struct MemoryStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryStoreFactory {
    async fn create(&self, config: &StoreConfig, zone: &ZoneId) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Memory { records } => Ok(Box::new(MemoryRecordStore::with_defaults(
                zone.clone(),
                ZoneName::new(zone.as_str()),
                *records,
            ))),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}
