//! Record store implementations shipped with the core crate
//!
//! This module provides an in-memory record store. Provider-backed stores
//! live in their own crates (e.g. `svcdns-store-route53`).

pub mod memory;

pub use memory::{MemoryRecordStore, MemoryStoreFactory};
