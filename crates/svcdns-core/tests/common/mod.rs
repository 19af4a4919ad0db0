//! Test doubles and common utilities for contract tests
//!
//! These doubles wrap the in-memory store or hold scripted answers so tests
//! can count calls and inject failures without any network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svcdns_core::error::{Error, Result};
use svcdns_core::traits::{EndpointSource, RecordStore};
use svcdns_core::{
    Address, DesiredSet, MemoryRecordStore, ObservedSet, RecordHandle, SchedulerConfig, ServiceName,
    ZoneId, ZoneName,
};

/// Build a desired set from address literals
pub fn desired(addresses: &[&str]) -> DesiredSet {
    addresses.iter().map(|a| Address::from(*a)).collect()
}

/// Scheduler settings suitable for tests (one-second call timeout)
pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        interval_secs: 1,
        call_timeout_secs: 1,
        max_concurrent_zones: 1,
        event_channel_capacity: 1000,
    }
}

/// Addresses published for `service` in `store`, ascending
pub async fn published(store: &dyn RecordStore, service: &str) -> Vec<String> {
    store
        .list_records(&ServiceName::from(service))
        .await
        .expect("listing succeeds")
        .addresses()
        .map(|a| a.to_string())
        .collect()
}

/// An endpoint source answering from a mutable script
#[derive(Clone, Default)]
pub struct ScriptedSource {
    answers: Arc<Mutex<HashMap<String, std::result::Result<Vec<String>, String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `addresses` as healthy for `service`
    pub fn set(&self, service: &str, addresses: &[&str]) {
        self.answers.lock().unwrap().insert(
            service.to_string(),
            Ok(addresses.iter().map(|a| a.to_string()).collect()),
        );
    }

    /// Make listing `service` fail
    pub fn fail(&self, service: &str, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(service.to_string(), Err(message.to_string()));
    }

    /// Number of list calls made for `service`
    pub fn call_count(&self, service: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| *s == service).count()
    }

    /// Total number of list calls
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EndpointSource for ScriptedSource {
    async fn list_endpoints(&self, service: &ServiceName) -> Result<DesiredSet> {
        self.calls.lock().unwrap().push(service.to_string());

        let answer = self.answers.lock().unwrap().get(service.as_str()).cloned();
        match answer {
            Some(Ok(addresses)) => Ok(addresses.into_iter().map(Address::from).collect()),
            Some(Err(message)) => Err(Error::discovery(service.as_str(), message)),
            None => Ok(DesiredSet::new()),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A record store wrapping [`MemoryRecordStore`] with fault injection
///
/// Clones share both the zone contents and the fault settings.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
    failing_list: Arc<Mutex<bool>>,
    failing_upserts: Arc<Mutex<Vec<String>>>,
    failing_deletes: Arc<Mutex<Vec<String>>>,
    list_delay: Arc<Mutex<Option<Duration>>>,
    upsert_delay: Arc<Mutex<Option<Duration>>>,
    list_calls: Arc<AtomicUsize>,
    upsert_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(zone: &str) -> Self {
        Self {
            inner: MemoryRecordStore::new(zone),
            failing_list: Arc::new(Mutex::new(false)),
            failing_upserts: Arc::new(Mutex::new(Vec::new())),
            failing_deletes: Arc::new(Mutex::new(Vec::new())),
            list_delay: Arc::new(Mutex::new(None)),
            upsert_delay: Arc::new(Mutex::new(None)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            upsert_calls: Arc::new(AtomicUsize::new(0)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every list call fail (or succeed again)
    pub fn set_failing_list(&self, failing: bool) {
        *self.failing_list.lock().unwrap() = failing;
    }

    /// Make upserts of `address` fail
    pub fn fail_upserts_of(&self, address: &str) {
        self.failing_upserts.lock().unwrap().push(address.to_string());
    }

    /// Let upserts succeed again
    pub fn heal_upserts(&self) {
        self.failing_upserts.lock().unwrap().clear();
    }

    /// Make deletes of record sets containing `address` fail
    pub fn fail_deletes_of(&self, address: &str) {
        self.failing_deletes.lock().unwrap().push(address.to_string());
    }

    /// Let deletes succeed again
    pub fn heal_deletes(&self) {
        self.failing_deletes.lock().unwrap().clear();
    }

    /// Delay every list call
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.lock().unwrap() = delay;
    }

    /// Delay every upsert call
    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    /// Put a record directly into the zone
    pub async fn seed(&self, service: &str, address: &str) {
        let name = ServiceName::from(service).record_name(self.inner.zone_name());
        self.inner
            .seed(RecordHandle::weighted(name, Address::from(address), 60, 100))
            .await;
    }

    /// Put a record set with several values directly into the zone
    ///
    /// `set_identifier` of `None` models a plain (non-weighted) record set.
    pub async fn seed_set(&self, service: &str, set_identifier: Option<&str>, values: &[&str]) {
        let name = ServiceName::from(service).record_name(self.inner.zone_name());
        self.inner
            .seed(RecordHandle {
                name,
                address: Address::from(values[0]),
                values: values.iter().map(|v| v.to_string()).collect(),
                ttl: Some(300),
                weight: set_identifier.map(|_| 100),
                set_identifier: set_identifier.map(str::to_string),
            })
            .await;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of mutating calls made so far
    pub fn write_calls(&self) -> usize {
        self.upsert_calls() + self.delete_calls()
    }

    pub fn memory(&self) -> &MemoryRecordStore {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    fn zone_id(&self) -> &ZoneId {
        self.inner.zone_id()
    }

    fn zone_name(&self) -> &ZoneName {
        self.inner.zone_name()
    }

    async fn list_records(&self, service: &ServiceName) -> Result<ObservedSet> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.failing_list.lock().unwrap() {
            return Err(Error::store(self.zone_id().as_str(), "list failed"));
        }

        self.inner.list_records(service).await
    }

    async fn upsert(&self, service: &ServiceName, address: &Address) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.upsert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_upserts
            .lock()
            .unwrap()
            .iter()
            .any(|a| a == address.as_str());
        if failing {
            return Err(Error::store(self.zone_id().as_str(), format!("upsert of {} rejected", address)));
        }

        self.inner.upsert(service, address).await
    }

    async fn delete(&self, handle: &RecordHandle) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_deletes
            .lock()
            .unwrap()
            .iter()
            .any(|a| handle.values.iter().any(|v| v == a));
        if failing {
            return Err(Error::store(
                self.zone_id().as_str(),
                format!("delete of {} rejected", handle.address),
            ));
        }

        self.inner.delete(handle).await
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}
