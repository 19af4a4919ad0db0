//! Core traits for the sync system
//!
//! This module defines the abstract interfaces that all adapters must follow.
//!
//! - [`EndpointSource`]: List healthy endpoints of a service
//! - [`RecordStore`]: List and mutate A records of one zone

pub mod endpoint_source;
pub mod record_store;

pub use endpoint_source::{EndpointSource, EndpointSourceFactory};
pub use record_store::{RecordStore, RecordStoreFactory};
