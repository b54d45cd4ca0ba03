//! Per-vendor sync jobs
//!
//! # State machine
//!
//! ```text
//!   idle ──┐
//! completed├─ Trigger ─> in_progress ─ Succeed ─> completed
//!   error ─┘                 │
//!     ^                      └──── Fail ────> error
//!     └──── ClearError (operator) ─> idle
//! ```
//!
//! Every status change goes through [`SyncStatus::apply`] while holding the
//! vendor's transition lock, so two triggers for one vendor can never both
//! reach `in_progress`. Different vendors use different locks.
//!
//! # Failure policy
//!
//! Item-level merge failures are counted and reported; the job still
//! completes. Feed failures and persistence failures outside the item loop
//! end the job in `error`. Nothing is retried here.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    SyncEvent, SyncStats, SyncStatus, SyncStrategy, TransitionError, VendorId, VendorSyncState,
};
use shared::util::now_millis;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::catalog::{CatalogMerger, ItemError, MergeMode, MergeReport, VendorSource};
use crate::db::{Store, StoreError};
use crate::feed::{FeedError, FeedRequest, VendorEntry, VendorRegistry};
use crate::gate::ConcurrencyGate;
use crate::recovery::RecoveryReport;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vendor {0} is not registered")]
    UnknownVendor(VendorId),

    #[error("sync already running for vendor {0}")]
    AlreadyRunning(VendorId),

    #[error("vendor {vendor_id}: cannot apply {event:?} while {from}")]
    InvalidTransition {
        vendor_id: VendorId,
        from: SyncStatus,
        event: SyncEvent,
    },

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::UnknownVendor(v) => AppError::vendor_not_found(v.as_str()),
            SyncError::AlreadyRunning(v) => AppError::sync_already_running(v.as_str()),
            e @ SyncError::InvalidTransition { .. } => {
                AppError::with_message(ErrorCode::SyncInvalidTransition, e.to_string())
            }
            SyncError::Feed(e) => e.into(),
            SyncError::Store(e) => e.into(),
        }
    }
}

/// Outcome of a finished job
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub vendor_id: VendorId,
    pub strategy: SyncStrategy,
    pub status: SyncStatus,
    pub stats: SyncStats,
    pub errors: Vec<ItemError>,
    pub started_at: i64,
    pub finished_at: i64,
}

/// Data pulled by one job before it is finalized
struct PulledRun {
    report: MergeReport,
    delta_cursor: Option<String>,
}

pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    registry: Arc<VendorRegistry>,
    gate: Arc<ConcurrencyGate>,
    merger: CatalogMerger,
    locks: DashMap<VendorId, Arc<Mutex<()>>>,
}

impl SyncOrchestrator {
    /// Requires the report of a completed recovery pass
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<VendorRegistry>,
        gate: Arc<ConcurrencyGate>,
        recovery: &RecoveryReport,
    ) -> Self {
        tracing::debug!(
            interrupted = recovery.interrupted().len(),
            "Sync orchestrator accepting triggers"
        );
        Self {
            merger: CatalogMerger::new(store.clone()),
            store,
            registry,
            gate,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Claim the vendor and run the job to completion
    pub async fn run_sync(
        &self,
        vendor_id: &VendorId,
        strategy: SyncStrategy,
    ) -> Result<SyncReport, SyncError> {
        let entry = self.entry(vendor_id)?.clone();
        let claimed = self.claim(vendor_id, strategy).await?;
        self.execute(&entry, strategy, claimed).await
    }

    /// Claim the vendor now and run the job in the background
    ///
    /// Returns the claimed (`in_progress`) state; `AlreadyRunning` is
    /// reported to the caller before anything is spawned.
    pub async fn start_sync(
        self: &Arc<Self>,
        vendor_id: &VendorId,
        strategy: SyncStrategy,
    ) -> Result<VendorSyncState, SyncError> {
        let entry = self.entry(vendor_id)?.clone();
        let claimed = self.claim(vendor_id, strategy).await?;

        let this = Arc::clone(self);
        let job_state = claimed.clone();
        tokio::spawn(async move {
            // Failures are already persisted on the vendor state
            let _ = this.execute(&entry, strategy, job_state).await;
        });

        Ok(claimed)
    }

    /// Current state of a registered vendor
    pub async fn status(&self, vendor_id: &VendorId) -> Result<VendorSyncState, SyncError> {
        self.entry(vendor_id)?;
        Ok(self
            .store
            .get_sync_state(vendor_id)
            .await?
            .unwrap_or_else(|| VendorSyncState::new(vendor_id.clone())))
    }

    /// States of all registered vendors
    pub async fn list_status(&self) -> Result<Vec<VendorSyncState>, SyncError> {
        let mut states = Vec::with_capacity(self.registry.len());
        for vendor_id in self.registry.ids() {
            states.push(self.status(vendor_id).await?);
        }
        Ok(states)
    }

    /// Operator acknowledgement of a failed job: `error -> idle`
    pub async fn clear_error(&self, vendor_id: &VendorId) -> Result<VendorSyncState, SyncError> {
        self.entry(vendor_id)?;
        let state = self
            .transition(vendor_id, SyncEvent::ClearError, |state| {
                state.last_error = None;
            })
            .await?;
        tracing::info!(vendor_id = %vendor_id, status = %state.status, "Sync error cleared");
        Ok(state)
    }

    fn entry(&self, vendor_id: &VendorId) -> Result<&VendorEntry, SyncError> {
        self.registry
            .get(vendor_id)
            .ok_or_else(|| SyncError::UnknownVendor(vendor_id.clone()))
    }

    async fn claim(
        &self,
        vendor_id: &VendorId,
        strategy: SyncStrategy,
    ) -> Result<VendorSyncState, SyncError> {
        let state = self
            .transition(vendor_id, SyncEvent::Trigger, |state| {
                state.strategy = Some(strategy);
                state.started_at = Some(now_millis());
                state.last_error = None;
            })
            .await?;
        tracing::info!(vendor_id = %vendor_id, strategy = %strategy, "Sync started");
        Ok(state)
    }

    async fn execute(
        &self,
        entry: &VendorEntry,
        strategy: SyncStrategy,
        claimed: VendorSyncState,
    ) -> Result<SyncReport, SyncError> {
        let vendor_id = entry.id().clone();
        let started_at = claimed.started_at.unwrap_or_else(now_millis);

        match self.pull(entry, strategy, &claimed).await {
            Ok(run) => {
                let stats = run.report.stats;
                let advances_watermark = strategy != SyncStrategy::MappingOnly;
                let state = self
                    .transition(&vendor_id, SyncEvent::Succeed, |state| {
                        let now = now_millis();
                        state.last_run_at = Some(now);
                        state.last_stats = Some(stats);
                        if advances_watermark {
                            state.last_success_at = Some(started_at);
                            if run.delta_cursor.is_some() {
                                state.delta_cursor = run.delta_cursor.clone();
                            }
                        }
                    })
                    .await
                    .inspect_err(|e| {
                        tracing::error!(vendor_id = %vendor_id, error = %e, "Failed to record sync success");
                    })?;

                tracing::info!(
                    vendor_id = %vendor_id,
                    strategy = %strategy,
                    processed = stats.processed,
                    created = stats.created,
                    updated = stats.updated,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Sync completed"
                );

                Ok(SyncReport {
                    vendor_id,
                    strategy,
                    status: state.status,
                    stats,
                    errors: run.report.errors,
                    started_at,
                    finished_at: state.last_run_at.unwrap_or_else(now_millis),
                })
            }
            Err((err, partial)) => {
                let message = err.to_string();
                tracing::error!(
                    vendor_id = %vendor_id,
                    strategy = %strategy,
                    error = %message,
                    "Sync failed"
                );

                let recorded = self
                    .transition(&vendor_id, SyncEvent::Fail, |state| {
                        state.last_error = Some(message.clone());
                        state.last_run_at = Some(now_millis());
                        state.last_stats = Some(partial.stats);
                    })
                    .await;
                if let Err(e) = recorded {
                    tracing::error!(vendor_id = %vendor_id, error = %e, "Failed to record sync failure");
                }
                Err(err)
            }
        }
    }

    /// Fetch every page through the gate and merge it
    ///
    /// On failure the counts merged so far are returned with the error.
    async fn pull(
        &self,
        entry: &VendorEntry,
        strategy: SyncStrategy,
        state: &VendorSyncState,
    ) -> Result<PulledRun, (SyncError, MergeReport)> {
        let request = match (strategy, state.last_success_at) {
            (SyncStrategy::Incremental, Some(since)) => FeedRequest {
                since: Some(since),
                cursor: state.delta_cursor.clone(),
            },
            (SyncStrategy::Incremental, None) => {
                tracing::info!(vendor_id = %entry.id(), "No previous successful sync, pulling full catalog");
                FeedRequest::full()
            }
            _ => FeedRequest::full(),
        };
        let mode = match strategy {
            SyncStrategy::MappingOnly => MergeMode::MappingOnly,
            SyncStrategy::Full | SyncStrategy::Incremental => MergeMode::Full,
        };
        let source = VendorSource::new(entry.id().clone(), entry.trust_weight());

        let mut report = MergeReport::default();
        let mut delta_cursor = None;
        let mut page = 1u32;

        loop {
            let feed = &entry.feed;
            let fetched = match self.gate.submit(|| feed.fetch_page(&request, page)).await {
                Ok(fetched) => fetched,
                Err(e) => return Err((e.into(), report)),
            };

            tracing::debug!(
                vendor_id = %entry.id(),
                page,
                items = fetched.items.len(),
                "Feed page fetched"
            );
            report.absorb(self.merger.merge_batch(&source, &fetched.items, mode).await);

            if fetched.delta_cursor.is_some() {
                delta_cursor = fetched.delta_cursor;
            }
            match fetched.next_page {
                None => break,
                Some(next) if next > page => page = next,
                Some(next) => {
                    let err = FeedError::Malformed(format!("page {page} points back to page {next}"));
                    return Err((err.into(), report));
                }
            }
        }

        Ok(PulledRun {
            report,
            delta_cursor,
        })
    }

    /// Apply `event` to the vendor's persisted status under its lock
    async fn transition<F>(
        &self,
        vendor_id: &VendorId,
        event: SyncEvent,
        update: F,
    ) -> Result<VendorSyncState, SyncError>
    where
        F: FnOnce(&mut VendorSyncState),
    {
        let lock = self.locks.entry(vendor_id.clone()).or_default().clone();
        let _guard = lock.lock().await;

        let mut state = self
            .store
            .get_sync_state(vendor_id)
            .await?
            .unwrap_or_else(|| VendorSyncState::new(vendor_id.clone()));

        state.status = state.status.apply(event).map_err(|e| match e {
            TransitionError::AlreadyRunning => SyncError::AlreadyRunning(vendor_id.clone()),
            TransitionError::Invalid { from, event } => SyncError::InvalidTransition {
                vendor_id: vendor_id.clone(),
                from,
                event,
            },
        })?;
        update(&mut state);

        Ok(self.store.save_sync_state(&state).await?)
    }
}
