//! Periodic incremental sync
//!
//! Vendors declaring `sync_interval_secs` get an incremental job once their
//! last run is older than the interval. A vendor in `error` is left alone
//! until an operator clears it.

use std::sync::Arc;
use std::time::Duration;

use shared::models::{SyncStatus, SyncStrategy, VendorId, VendorSyncState};
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{SyncError, SyncOrchestrator};

pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    tick: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        tick: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            tick,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(tick_secs = self.tick.as_secs(), "Sync scheduler started");
        let mut interval = tokio::time::interval(self.tick);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick_once().await;
                }
            }
        }
    }

    /// Start every due vendor, returning the ones started
    pub async fn tick_once(&self) -> Vec<VendorId> {
        let now = now_millis();
        let mut started = Vec::new();

        for entry in self.orchestrator.registry().iter() {
            let Some(secs) = entry.config.sync_interval_secs.filter(|s| *s > 0) else {
                continue;
            };
            let vendor_id = entry.id();

            let state = match self.orchestrator.status(vendor_id).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(vendor_id = %vendor_id, error = %e, "Scheduler could not read sync state");
                    continue;
                }
            };
            if !is_due(&state, secs, now) {
                continue;
            }

            match self
                .orchestrator
                .start_sync(vendor_id, SyncStrategy::Incremental)
                .await
            {
                Ok(_) => started.push(vendor_id.clone()),
                Err(SyncError::AlreadyRunning(_)) => {
                    tracing::debug!(vendor_id = %vendor_id, "Scheduled sync skipped, already running");
                }
                Err(e) => {
                    tracing::warn!(vendor_id = %vendor_id, error = %e, "Scheduled sync not started");
                }
            }
        }

        started
    }
}

fn is_due(state: &VendorSyncState, interval_secs: u64, now: i64) -> bool {
    let interval_ms = i64::try_from(interval_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    match state.status {
        SyncStatus::InProgress | SyncStatus::Error => false,
        SyncStatus::Idle | SyncStatus::Completed => state
            .last_run_at
            .is_none_or(|last| now.saturating_sub(last) >= interval_ms),
    }
}
