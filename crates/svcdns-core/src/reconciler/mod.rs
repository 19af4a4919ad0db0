//! Desired/observed reconciliation
//!
//! The Reconciler is responsible for:
//! - Diffing the desired address set against the observed one
//! - Applying the resulting inserts and deletes through a [`RecordStore`]
//! - Reporting what happened, action by action
//!
//! ## Flow
//!
//! ```text
//!  DesiredSet ──┐
//!               ├──▶ plan() ──▶ ReconcilePlan ──▶ apply() ──▶ ReconcileReport
//! ObservedSet ──┘                  │                 │
//!                                  │                 ▼
//!                                  │          ┌─────────────┐
//!                                  │          │ RecordStore │
//!                                  │          │ upsert/del  │
//!                                  │          └─────────────┘
//!                                  ▼
//!                     borrows handles from ObservedSet
//! ```
//!
//! Planning is pure. Applying is best effort: every action is attempted, a
//! failing action is recorded and the next one proceeds. Nothing is retried
//! within a pass; the next tick re-derives everything and tries again.

use crate::error::Error;
use crate::traits::RecordStore;
use crate::types::{Address, DesiredSet, ObservedSet, RecordHandle, ServiceName, ZoneId};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Kind of change applied to a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Publish a missing endpoint
    Insert,
    /// Remove a stale record
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Insert => f.write_str("insert"),
            ActionKind::Delete => f.write_str("delete"),
        }
    }
}

/// A single change computed by [`plan`]
///
/// Delete actions borrow their handle from the tick's [`ObservedSet`], so a
/// plan cannot outlive the observation it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction<'a> {
    /// Address is healthy but not published
    Insert(&'a Address),
    /// Record is published but its address is no longer healthy
    Delete(&'a RecordHandle),
}

impl<'a> ReconcileAction<'a> {
    /// Address the action is about
    pub fn address(&self) -> &'a Address {
        match self {
            ReconcileAction::Insert(address) => address,
            ReconcileAction::Delete(handle) => &handle.address,
        }
    }

    /// Kind of the action
    pub fn kind(&self) -> ActionKind {
        match self {
            ReconcileAction::Insert(_) => ActionKind::Insert,
            ReconcileAction::Delete(_) => ActionKind::Delete,
        }
    }
}

/// Changes needed to make one zone match the desired set for one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan<'a> {
    /// Desired addresses that are not published, ascending
    pub inserts: Vec<&'a Address>,
    /// Record sets publishing an address that is not desired, one per set,
    /// ascending by address
    pub deletes: Vec<&'a RecordHandle>,
    /// Desired addresses whose every record set is being deleted because it
    /// also carries a stale value; republished after the deletes, ascending
    pub reinserts: Vec<&'a Address>,
    /// Addresses already converged, ascending
    pub unchanged: Vec<&'a Address>,
}

impl<'a> ReconcilePlan<'a> {
    /// All actions: inserts, then deletes, then reinserts
    pub fn actions(&self) -> impl Iterator<Item = ReconcileAction<'a>> + '_ {
        self.inserts
            .iter()
            .copied()
            .map(ReconcileAction::Insert)
            .chain(self.deletes.iter().copied().map(ReconcileAction::Delete))
            .chain(self.reinserts.iter().copied().map(ReconcileAction::Insert))
    }

    /// Number of actions to apply
    pub fn len(&self) -> usize {
        self.inserts.len() + self.deletes.len() + self.reinserts.len()
    }

    /// Whether the zone is already converged
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the changes that turn `observed` into `desired`
///
/// Both inputs are sets, so an address can never be both inserted and
/// deleted. A record set shared by a stale and a desired address is deleted
/// whole; the desired address is then reinserted on its own.
pub fn plan<'a>(desired: &'a DesiredSet, observed: &'a ObservedSet) -> ReconcilePlan<'a> {
    let mut plan = ReconcilePlan::default();

    for (address, handles) in observed.iter() {
        if desired.contains(address) {
            continue;
        }
        for handle in handles {
            if !plan.deletes.iter().any(|d| d.same_record_set(handle)) {
                plan.deletes.push(handle);
            }
        }
    }

    for address in desired {
        let handles = observed.handles(address);
        if handles.is_empty() {
            plan.inserts.push(address);
        } else if handles
            .iter()
            .all(|h| plan.deletes.iter().any(|d| d.same_record_set(h)))
        {
            plan.reinserts.push(address);
        } else {
            plan.unchanged.push(address);
        }
    }

    plan
}

/// An action that could not be applied
#[derive(Debug)]
pub struct FailedAction {
    /// What was attempted
    pub kind: ActionKind,
    /// Address the action was about
    pub address: Address,
    /// Why it failed
    pub error: Error,
}

/// Outcome of reconciling one (service, zone) pair
///
/// Used for logging and events only; the next tick retries whatever did not
/// converge regardless of what is reported here.
#[derive(Debug)]
pub struct ReconcileReport {
    /// Service that was reconciled
    pub service: ServiceName,
    /// Zone that was reconciled
    pub zone: ZoneId,
    /// Addresses that needed no change
    pub unchanged: Vec<Address>,
    /// Addresses successfully published
    pub inserted: Vec<Address>,
    /// Addresses whose stale record was removed
    pub deleted: Vec<Address>,
    /// Actions that failed
    pub failed: Vec<FailedAction>,
}

impl ReconcileReport {
    fn new(service: &ServiceName, zone: &ZoneId) -> Self {
        Self {
            service: service.clone(),
            zone: zone.clone(),
            unchanged: Vec::new(),
            inserted: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Whether every planned action succeeded
    pub fn is_converged(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of actions attempted
    pub fn action_count(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.failed.len()
    }
}

/// Applies reconciliation plans through a record store
#[derive(Debug, Clone)]
pub struct Reconciler {
    /// Upper bound for each upsert/delete call
    call_timeout: Duration,
}

impl Reconciler {
    /// Create a reconciler bounding each store call by `call_timeout`
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    /// Diff `desired` against `observed` and apply the result to `store`
    pub async fn reconcile(
        &self,
        service: &ServiceName,
        desired: &DesiredSet,
        observed: &ObservedSet,
        store: &dyn RecordStore,
    ) -> ReconcileReport {
        let plan = plan(desired, observed);
        self.apply(service, &plan, store).await
    }

    /// Apply every action of `plan`, continuing past failures
    pub async fn apply(
        &self,
        service: &ServiceName,
        plan: &ReconcilePlan<'_>,
        store: &dyn RecordStore,
    ) -> ReconcileReport {
        let zone = store.zone_id();
        let mut report = ReconcileReport::new(service, zone);

        for address in &plan.unchanged {
            debug!(
                service = %service,
                zone = %zone,
                address = %address,
                action = "none",
                "Endpoint already published"
            );
            report.unchanged.push((*address).clone());
        }

        for address in &plan.reinserts {
            debug!(
                service = %service,
                zone = %zone,
                address = %address,
                "Endpoint shares a record set with a stale address, republishing after delete"
            );
        }

        for action in plan.actions() {
            let address = action.address();
            let kind = action.kind();

            match kind {
                ActionKind::Insert => info!(
                    service = %service,
                    zone = %zone,
                    address = %address,
                    action = %kind,
                    "Publishing missing endpoint"
                ),
                ActionKind::Delete => info!(
                    service = %service,
                    zone = %zone,
                    address = %address,
                    action = %kind,
                    "Removing stale record"
                ),
            }

            match self.apply_one(service, action, store).await {
                Ok(()) => match kind {
                    ActionKind::Insert => report.inserted.push(address.clone()),
                    ActionKind::Delete => report.deleted.push(address.clone()),
                },
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            service = %service,
                            zone = %zone,
                            address = %address,
                            action = %kind,
                            error = %e,
                            "Failed to apply change, will retry next tick"
                        );
                    } else {
                        error!(
                            service = %service,
                            zone = %zone,
                            address = %address,
                            action = %kind,
                            error = %e,
                            "Failed to apply change"
                        );
                    }
                    report.failed.push(FailedAction {
                        kind,
                        address: address.clone(),
                        error: e,
                    });
                }
            }
        }

        report
    }

    async fn apply_one(
        &self,
        service: &ServiceName,
        action: ReconcileAction<'_>,
        store: &dyn RecordStore,
    ) -> Result<(), Error> {
        let call = async {
            match action {
                ReconcileAction::Insert(address) => store.upsert(service, address).await,
                ReconcileAction::Delete(handle) => store.delete(handle).await,
            }
        };

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("{} of {} in zone {}", action.kind(), action.address(), store.zone_id()),
                self.call_timeout,
            )),
        }
    }
}
