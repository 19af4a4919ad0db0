//! Contract Test: Reconciliation
//!
//! This test verifies the diff/apply behavior against a real store.
//!
//! Constraints verified:
//! - One pass converges a zone to the desired set
//! - A second pass with unchanged inputs issues no writes
//! - A failing action does not prevent the others
//! - Record sets shared with stale addresses never take a healthy endpoint down
//! - Records removed or added outside the daemon are repaired on the next pass
//!
//! If this test fails, zones will drift from discovery.

mod common;

use common::*;
use std::time::Duration;
use svcdns_core::reconciler::ActionKind;
use svcdns_core::traits::RecordStore;
use svcdns_core::{Address, Reconciler, ServiceName};
use tokio_test::assert_ok;

async fn reconcile(store: &FlakyStore, service: &str, addresses: &[&str]) -> svcdns_core::ReconcileReport {
    let service = ServiceName::from(service);
    let observed = assert_ok!(store.list_records(&service).await);
    Reconciler::new(Duration::from_secs(1))
        .reconcile(&service, &desired(addresses), &observed, store)
        .await
}

#[tokio::test]
async fn new_endpoint_is_published() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.2").await;

    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2"]).await;

    assert!(report.is_converged());
    assert_eq!(report.inserted, vec![Address::from("10.0.0.1")]);
    assert!(report.deleted.is_empty());
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1", "10.0.0.2"]);
}

#[tokio::test]
async fn stale_record_is_removed() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.1").await;
    store.seed("api", "10.0.0.3").await;

    let report = reconcile(&store, "api", &["10.0.0.1"]).await;

    assert_eq!(report.deleted, vec![Address::from("10.0.0.3")]);
    assert_eq!(report.unchanged, vec![Address::from("10.0.0.1")]);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1"]);
}

#[tokio::test]
async fn empty_desired_set_clears_service() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.5").await;
    store.seed("web", "10.0.0.6").await;

    let report = reconcile(&store, "api", &[]).await;

    assert_eq!(report.deleted, vec![Address::from("10.0.0.5")]);
    assert!(published(&store, "api").await.is_empty());
    // Other services in the zone are untouched
    assert_eq!(published(&store, "web").await, vec!["10.0.0.6"]);
}

#[tokio::test]
async fn converged_zone_issues_no_writes() {
    let store = FlakyStore::new("example.com.");

    reconcile(&store, "api", &["10.0.0.1", "10.0.0.2"]).await;
    let writes_after_first = store.write_calls();
    assert_eq!(writes_after_first, 2);

    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2"]).await;

    assert_eq!(report.action_count(), 0);
    assert_eq!(report.unchanged.len(), 2);
    assert_eq!(store.write_calls(), writes_after_first, "second pass must not write");
}

#[tokio::test]
async fn failed_insert_does_not_block_other_actions() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.9").await;
    store.fail_upserts_of("10.0.0.1");

    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2"]).await;

    assert!(!report.is_converged());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].address.as_str(), "10.0.0.1");
    assert_eq!(report.inserted, vec![Address::from("10.0.0.2")]);
    assert_eq!(report.deleted, vec![Address::from("10.0.0.9")]);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.2"]);

    // The next pass retries what failed
    store.heal_upserts();
    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2"]).await;
    assert_eq!(report.inserted, vec![Address::from("10.0.0.1")]);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1", "10.0.0.2"]);
}

#[tokio::test]
async fn failed_delete_does_not_block_other_actions() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.7").await;
    store.seed("api", "10.0.0.8").await;
    store.seed("api", "10.0.0.9").await;
    store.fail_deletes_of("10.0.0.7");

    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2", "10.0.0.8"]).await;

    assert!(!report.is_converged());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, ActionKind::Delete);
    assert_eq!(report.failed[0].address.as_str(), "10.0.0.7");
    assert_eq!(report.inserted, vec![Address::from("10.0.0.1"), Address::from("10.0.0.2")]);
    assert_eq!(report.deleted, vec![Address::from("10.0.0.9")]);
    assert_eq!(report.unchanged, vec![Address::from("10.0.0.8")]);
    assert_eq!(store.write_calls(), 4);
    assert_eq!(
        published(&store, "api").await,
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.7", "10.0.0.8"]
    );

    // The next pass retries the delete alone
    store.heal_deletes();
    let report = reconcile(&store, "api", &["10.0.0.1", "10.0.0.2", "10.0.0.8"]).await;
    assert!(report.is_converged());
    assert_eq!(report.action_count(), 1);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1", "10.0.0.2", "10.0.0.8"]);
}

#[tokio::test]
async fn shared_record_set_keeps_healthy_endpoint() {
    let store = FlakyStore::new("example.com.");
    store.seed_set("api", None, &["10.0.0.1", "10.0.0.2"]).await;

    let report = reconcile(&store, "api", &["10.0.0.1"]).await;

    assert!(report.is_converged());
    assert!(report.unchanged.is_empty());
    assert_eq!(report.deleted, vec![Address::from("10.0.0.2")]);
    assert_eq!(report.inserted, vec![Address::from("10.0.0.1")]);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1"]);

    // Converged: the republished record is now its own set
    let writes = store.write_calls();
    let report = reconcile(&store, "api", &["10.0.0.1"]).await;
    assert_eq!(report.unchanged, vec![Address::from("10.0.0.1")]);
    assert_eq!(store.write_calls(), writes);
}

#[tokio::test]
async fn every_record_set_of_stale_address_is_removed() {
    let store = FlakyStore::new("example.com.");
    store.seed("api", "10.0.0.5").await;
    store.seed_set("api", Some("legacy"), &["10.0.0.5"]).await;

    let report = reconcile(&store, "api", &[]).await;

    assert!(report.is_converged());
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(store.delete_calls(), 2);
    assert!(published(&store, "api").await.is_empty());
    assert!(store.memory().is_empty().await);
}

#[tokio::test]
async fn slow_action_times_out_and_is_reported() {
    let store = FlakyStore::new("example.com.");
    store.set_upsert_delay(Some(Duration::from_millis(500)));

    let service = ServiceName::from("api");
    let observed = assert_ok!(store.list_records(&service).await);
    let report = Reconciler::new(Duration::from_millis(50))
        .reconcile(&service, &desired(&["10.0.0.1"]), &observed, &store)
        .await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.is_transient());
    assert!(report.failed[0].error.to_string().contains("timed out"));
}

#[tokio::test]
async fn externally_deleted_record_is_restored() {
    let store = FlakyStore::new("example.com.");
    reconcile(&store, "api", &["10.0.0.1"]).await;

    // Someone removes the record by hand
    store.memory().clear().await;

    let report = reconcile(&store, "api", &["10.0.0.1"]).await;
    assert_eq!(report.inserted, vec![Address::from("10.0.0.1")]);
    assert_eq!(published(&store, "api").await, vec!["10.0.0.1"]);
}
