//! Startup recovery
//!
//! Runs once before the orchestrator exists. A vendor left `in_progress` by
//! an unclean shutdown is moved to `error` so it is never reported as
//! running forever; the next trigger starts the job over. Registered vendors
//! without a state row get a fresh `idle` one.

use std::sync::Arc;

use shared::models::{SyncEvent, SyncStatus, VendorId, VendorSyncState};
use shared::util::now_millis;

use crate::audit_log;
use crate::db::{Store, StoreResult};
use crate::feed::VendorRegistry;

pub const INTERRUPTED_MESSAGE: &str = "Sync interrupted by restart";

/// Proof that recovery ran, required to build the orchestrator
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    seeded: Vec<VendorId>,
    interrupted: Vec<VendorId>,
}

impl RecoveryReport {
    /// Vendors that got a fresh idle state
    pub fn seeded(&self) -> &[VendorId] {
        &self.seeded
    }

    /// Vendors reset from `in_progress` to `error`
    pub fn interrupted(&self) -> &[VendorId] {
        &self.interrupted
    }
}

pub struct RecoveryManager {
    store: Arc<dyn Store>,
}

impl RecoveryManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn run(&self, registry: &VendorRegistry) -> StoreResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let now = now_millis();

        for mut state in self.store.list_sync_states().await? {
            if state.status != SyncStatus::InProgress {
                continue;
            }
            // InProgress + Interrupt is always a valid transition
            state.status = state
                .status
                .apply(SyncEvent::Interrupt)
                .unwrap_or(SyncStatus::Error);
            state.last_error = Some(INTERRUPTED_MESSAGE.to_string());
            state.last_run_at = Some(now);
            self.store.save_sync_state(&state).await?;

            audit_log!(
                "system",
                "sync_interrupted",
                state.vendor_id.as_str(),
                "reset in_progress to error after restart"
            );
            report.interrupted.push(state.vendor_id);
        }

        for vendor_id in registry.ids() {
            if self.store.get_sync_state(vendor_id).await?.is_none() {
                self.store
                    .save_sync_state(&VendorSyncState::new(vendor_id.clone()))
                    .await?;
                report.seeded.push(vendor_id.clone());
            }
        }

        tracing::info!(
            interrupted = report.interrupted.len(),
            seeded = report.seeded.len(),
            "Sync state recovery completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RedbStore;
    use crate::feed::testing::ScriptedFeed;
    use crate::feed::{FeedConfig, VendorConfig, VendorEntry};

    fn registry(ids: &[&str]) -> VendorRegistry {
        let entries = ids
            .iter()
            .map(|id| VendorEntry {
                config: VendorConfig {
                    id: VendorId::from(*id),
                    name: id.to_string(),
                    trust_weight: 50,
                    sync_interval_secs: None,
                    feed: FeedConfig::HttpJson {
                        base_url: "http://localhost".into(),
                        api_key: None,
                    },
                },
                feed: Arc::new(ScriptedFeed::default()),
            })
            .collect();
        VendorRegistry::from_entries(entries).unwrap()
    }

    #[tokio::test]
    async fn test_in_progress_becomes_error() {
        let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().unwrap());

        let mut running = VendorSyncState::new(VendorId::from("acme"));
        running.status = SyncStatus::InProgress;
        store.save_sync_state(&running).await.unwrap();

        let mut done = VendorSyncState::new(VendorId::from("globex"));
        done.status = SyncStatus::Completed;
        store.save_sync_state(&done).await.unwrap();

        let report = RecoveryManager::new(store.clone())
            .run(&registry(&["acme", "globex"]))
            .await
            .unwrap();
        assert_eq!(report.interrupted(), &[VendorId::from("acme")]);

        let acme = store.get_sync_state(&VendorId::from("acme")).await.unwrap().unwrap();
        assert_eq!(acme.status, SyncStatus::Error);
        assert!(acme.last_error.as_deref().is_some_and(|m| !m.is_empty()));

        let globex = store.get_sync_state(&VendorId::from("globex")).await.unwrap().unwrap();
        assert_eq!(globex.status, SyncStatus::Completed);
    }

    #[tokio::test]
    async fn test_seeds_missing_states() {
        let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().unwrap());
        let report = RecoveryManager::new(store.clone())
            .run(&registry(&["acme"]))
            .await
            .unwrap();

        assert_eq!(report.seeded(), &[VendorId::from("acme")]);
        let state = store.get_sync_state(&VendorId::from("acme")).await.unwrap().unwrap();
        assert_eq!(state.status, SyncStatus::Idle);

        // Second pass is a no-op
        let again = RecoveryManager::new(store).run(&registry(&["acme"])).await.unwrap();
        assert!(again.seeded().is_empty());
        assert!(again.interrupted().is_empty());
    }
}
