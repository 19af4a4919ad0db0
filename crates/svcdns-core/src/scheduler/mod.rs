//! Periodic reconciliation driver
//!
//! The Scheduler is responsible for:
//! - Firing a pass on a fixed interval
//! - Fetching the desired set once per service per pass
//! - Reconciling that set into every configured zone
//! - Isolating failures per service and per (service, zone) pair
//!
//! ## Architecture
//!
//! ```text
//!              tick
//!               │
//!               ▼
//!        ┌──────────────┐   list_endpoints(service)   ┌────────────────┐
//!        │  Scheduler   │────────────────────────────▶│ EndpointSource │
//!        └──────────────┘                             └────────────────┘
//!               │ for each zone
//!               ▼
//!        ┌──────────────┐   list_records / upsert / delete   ┌─────────────┐
//!        │  Reconciler  │───────────────────────────────────▶│ RecordStore │
//!        └──────────────┘                                    └─────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! 1. Discovery fails for a service → that service is skipped in every zone this tick
//! 2. Listing fails for a zone → only that (service, zone) pair is skipped
//! 3. A single upsert/delete fails → recorded, the remaining changes still run
//!
//! Nothing inside a pass stops the scheduler. The next tick re-derives all
//! state and retries whatever did not converge.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::traits::{EndpointSource, RecordStore};
use crate::types::{DesiredSet, ObservedSet, ServiceName, ZoneId};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Draining the service × zone work list of the current tick
    Reconciling,
}

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler started
    Started {
        services: usize,
        zones: usize,
    },

    /// A pass began
    TickStarted {
        tick: u64,
        at: DateTime<Utc>,
    },

    /// Desired set could not be fetched; service skipped in every zone
    DiscoveryFailed {
        tick: u64,
        service: ServiceName,
        error: String,
    },

    /// Observed set could not be fetched; pair skipped
    ObservationFailed {
        tick: u64,
        service: ServiceName,
        zone: ZoneId,
        error: String,
    },

    /// A pair was diffed and its changes applied
    PairReconciled {
        tick: u64,
        service: ServiceName,
        zone: ZoneId,
        unchanged: usize,
        inserted: usize,
        deleted: usize,
        failed: usize,
    },

    /// A pass finished
    TickCompleted {
        tick: u64,
        summary: TickSummary,
    },

    /// Scheduler stopped
    Stopped {
        reason: String,
    },
}

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Services whose desired set was requested
    pub services_attempted: usize,
    /// Services whose desired set could not be fetched
    pub services_failed: usize,
    /// Pairs that were diffed and applied
    pub pairs_reconciled: usize,
    /// Pairs whose observed set could not be fetched
    pub pairs_failed: usize,
    /// Pairs not started because shutdown was requested
    pub pairs_skipped: usize,
    /// Changes applied successfully
    pub actions_applied: usize,
    /// Changes that failed
    pub actions_failed: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Reconciled(report) => {
                self.pairs_reconciled += 1;
                self.actions_applied += report.inserted.len() + report.deleted.len();
                self.actions_failed += report.failed.len();
            }
            PairOutcome::ObservationFailed => self.pairs_failed += 1,
            PairOutcome::Skipped => self.pairs_skipped += 1,
        }
    }
}

enum PairOutcome {
    Reconciled(ReconcileReport),
    ObservationFailed,
    Skipped,
}

/// Periodic reconciliation driver
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`]
/// 2. Start with [`Scheduler::run()`] or [`Scheduler::run_with_shutdown()`]
/// 3. The first pass runs immediately, later passes follow the interval
/// 4. On shutdown the in-flight pass finishes its current (service, zone) unit
///    and starts no new ones
///
/// ## Concurrency
///
/// Passes never overlap. Within a pass services run one after another; the
/// zones of one service run with at most `max_concurrent_zones` in flight.
/// Each pair reads and applies on its own snapshot, so pairs share no
/// mutable state.
pub struct Scheduler {
    /// Endpoint source for desired state
    source: Arc<dyn EndpointSource>,

    /// One store per managed zone
    stores: Vec<Arc<dyn RecordStore>>,

    /// Services to synchronize
    services: Vec<ServiceName>,

    /// Interval between passes
    interval: Duration,

    /// Upper bound for any single adapter call
    call_timeout: Duration,

    /// Zones of one service reconciled concurrently
    max_concurrent_zones: usize,

    /// Diff/apply engine
    reconciler: Reconciler,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,

    /// Current lifecycle state
    state_tx: watch::Sender<SchedulerState>,

    /// Number of passes started so far
    ticks: AtomicU64,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `source`: Endpoint source implementation
    /// - `stores`: One record store per zone (at least one)
    /// - `services`: Services to synchronize (at least one)
    /// - `config`: Scheduler settings
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        source: Arc<dyn EndpointSource>,
        stores: Vec<Arc<dyn RecordStore>>,
        services: Vec<ServiceName>,
        config: &SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;
        if services.is_empty() {
            return Err(Error::config("Scheduler needs at least one service"));
        }
        if stores.is_empty() {
            return Err(Error::config("Scheduler needs at least one zone"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (state_tx, _) = watch::channel(SchedulerState::Idle);

        let scheduler = Self {
            source,
            stores,
            services,
            interval: config.interval(),
            call_timeout: config.call_timeout(),
            max_concurrent_zones: config.max_concurrent_zones,
            reconciler: Reconciler::new(config.call_timeout()),
            event_tx: tx,
            state_tx,
            ticks: AtomicU64::new(0),
        };

        Ok((scheduler, rx))
    }

    /// Override the interval between passes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the bound on adapter calls
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.reconciler = Reconciler::new(call_timeout);
        self
    }

    /// Watch the scheduler's lifecycle state
    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// A shutdown that arrives mid-pass lets the units already in flight finish
    /// their list-then-apply sequence; no new unit is started.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.emit_event(SchedulerEvent::Started {
            services: self.services.len(),
            zones: self.stores.len(),
        });
        info!(
            services = self.services.len(),
            zones = self.stores.len(),
            interval = ?self.interval,
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stop = AtomicBool::new(false);
        let mut shutdown_seen = false;
        tokio::pin!(shutdown);

        while !shutdown_seen {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    shutdown_seen = true;
                    continue;
                }
            }

            let pass = self.run_pass(&stop);
            tokio::pin!(pass);

            loop {
                tokio::select! {
                    _ = &mut pass => break,
                    _ = &mut shutdown, if !shutdown_seen => {
                        shutdown_seen = true;
                        stop.store(true, Ordering::SeqCst);
                        info!("Shutdown requested, finishing in-flight reconciliation");
                    }
                }
            }
        }

        info!("Shutdown signal received");
        self.state_tx.send_replace(SchedulerState::Idle);
        self.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run exactly one pass over every service and zone
    pub async fn run_tick(&self) -> TickSummary {
        self.run_pass(&AtomicBool::new(false)).await
    }

    async fn run_pass(&self, stop: &AtomicBool) -> TickSummary {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(SchedulerState::Reconciling);
        self.emit_event(SchedulerEvent::TickStarted { tick, at: Utc::now() });
        info!(tick, "Sync fired");

        let mut summary = TickSummary::default();

        for service in &self.services {
            if stop.load(Ordering::SeqCst) {
                summary.pairs_skipped += self.stores.len();
                continue;
            }

            summary.services_attempted += 1;

            let desired = match self.fetch_desired(service).await {
                Ok(desired) => desired,
                Err(e) => {
                    error!(tick, service = %service, error = %e, "Failed to list endpoints, skipping service");
                    summary.services_failed += 1;
                    self.emit_event(SchedulerEvent::DiscoveryFailed {
                        tick,
                        service: service.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(tick, service = %service, endpoints = desired.len(), "Fetched desired endpoints");

            let pair_futures: Vec<_> = self
                .stores
                .iter()
                .map(|store| self.reconcile_pair(tick, service, &desired, store.as_ref(), stop))
                .collect();
            let outcomes: Vec<PairOutcome> = stream::iter(pair_futures)
                .buffer_unordered(self.max_concurrent_zones)
                .collect()
                .await;

            for outcome in &outcomes {
                summary.record(outcome);
            }
        }

        info!(
            tick,
            services_failed = summary.services_failed,
            pairs_reconciled = summary.pairs_reconciled,
            pairs_failed = summary.pairs_failed,
            actions_applied = summary.actions_applied,
            actions_failed = summary.actions_failed,
            "Sync finished"
        );

        self.emit_event(SchedulerEvent::TickCompleted {
            tick,
            summary: summary.clone(),
        });
        self.state_tx.send_replace(SchedulerState::Idle);

        summary
    }

    async fn reconcile_pair(
        &self,
        tick: u64,
        service: &ServiceName,
        desired: &DesiredSet,
        store: &dyn RecordStore,
        stop: &AtomicBool,
    ) -> PairOutcome {
        if stop.load(Ordering::SeqCst) {
            debug!(tick, service = %service, zone = %store.zone_id(), "Shutdown requested, pair not started");
            return PairOutcome::Skipped;
        }

        let observed = match self.fetch_observed(service, store).await {
            Ok(observed) => observed,
            Err(e) => {
                error!(
                    tick,
                    service = %service,
                    zone = %store.zone_id(),
                    error = %e,
                    "Failed to list records, skipping zone"
                );
                self.emit_event(SchedulerEvent::ObservationFailed {
                    tick,
                    service: service.clone(),
                    zone: store.zone_id().clone(),
                    error: e.to_string(),
                });
                return PairOutcome::ObservationFailed;
            }
        };

        let report = self.reconciler.reconcile(service, desired, &observed, store).await;

        self.emit_event(SchedulerEvent::PairReconciled {
            tick,
            service: service.clone(),
            zone: report.zone.clone(),
            unchanged: report.unchanged.len(),
            inserted: report.inserted.len(),
            deleted: report.deleted.len(),
            failed: report.failed.len(),
        });

        PairOutcome::Reconciled(report)
    }

    async fn fetch_desired(&self, service: &ServiceName) -> Result<DesiredSet> {
        match tokio::time::timeout(self.call_timeout, self.source.list_endpoints(service)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("listing endpoints of {} from {}", service, self.source.source_name()),
                self.call_timeout,
            )),
        }
    }

    async fn fetch_observed(&self, service: &ServiceName, store: &dyn RecordStore) -> Result<ObservedSet> {
        match tokio::time::timeout(self.call_timeout, store.list_records(service)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("listing records of {} in zone {}", service, store.zone_id()),
                self.call_timeout,
            )),
        }
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Dropped rather than blocking the pass
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
