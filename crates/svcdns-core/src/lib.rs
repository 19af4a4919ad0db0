// # svcdns-core
//
// Core library for keeping DNS address records in sync with service discovery.
//
// ## Architecture Overview
//
// This library provides the reconciliation engine and the seams around it:
// - **EndpointSource**: Trait for listing healthy endpoints of a service
// - **RecordStore**: Trait for listing, upserting and deleting A records in one zone
// - **Reconciler**: Diffs desired against observed addresses and applies the changes
// - **Scheduler**: Drives the reconciler over services × zones on a fixed interval
// - **AdapterRegistry**: Plugin-based registry for sources and stores
//
// ## Design Principles
//
// 1. **Stateless**: Every tick re-derives desired and observed state from the two
//    external systems; nothing is persisted between ticks
// 2. **Isolated failures**: A failing service, zone or record never blocks its siblings
// 3. **Plugin-Based**: Sources and stores are registered by name, no hard-coded if-else
// 4. **Library-First**: The daemon is a thin wrapper over this crate
// 5. **Idempotency**: Inserts are upserts keyed by address, so re-applying is harmless

pub mod config;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod traits;
pub mod types;

// Re-export core types for convenience
pub use config::{SchedulerConfig, SourceConfig, StoreConfig, SyncConfig};
pub use error::{Error, Result};
pub use reconciler::{ReconcileAction, ReconcilePlan, ReconcileReport, Reconciler};
pub use registry::AdapterRegistry;
pub use scheduler::{Scheduler, SchedulerEvent, SchedulerState, TickSummary};
pub use store::MemoryRecordStore;
pub use traits::{EndpointSource, RecordStore};
pub use types::{Address, DesiredSet, ObservedSet, RecordHandle, ServiceName, ZoneId, ZoneName};
