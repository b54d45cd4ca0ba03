use std::path::Path;
use std::sync::Arc;

use crate::asn::AsnReconciler;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::db::{RedbStore, Store};
use crate::feed::VendorRegistry;
use crate::gate::ConcurrencyGate;
use crate::recovery::RecoveryManager;
use crate::sync::{SyncOrchestrator, SyncScheduler};

/// Shared handles to every service
///
/// Cloning is cheap; every field is an `Arc`.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | immutable configuration |
/// | store | redb-backed persistence |
/// | registry | vendors resolved at startup |
/// | gate | outbound request limiter shared by feeds and order submission |
/// | orchestrator | per-vendor sync jobs |
/// | reconciler | ASN recording for submitted orders (library entry point) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<VendorRegistry>,
    pub gate: Arc<ConcurrencyGate>,
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Library entry point for order submission
    ///
    /// No HTTP route reaches it. Embedders call
    /// [`AsnReconciler::submit_and_reconcile`] with their own
    /// [`VendorOrderApi`](crate::asn::VendorOrderApi); the call takes a slot
    /// of the same gate the feeds use.
    pub reconciler: Arc<AsnReconciler>,
}

impl ServerState {
    /// Open the on-disk store, load vendors and run recovery
    pub async fn initialize(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store: Arc<dyn Store> = Arc::new(RedbStore::open(&db_path)?);
        tracing::info!(path = %db_path.display(), "Database opened");

        let registry = VendorRegistry::load(Path::new(&config.vendors_file), config.feed_timeout())?;
        tracing::info!(vendors = registry.len(), file = %config.vendors_file, "Vendor registry loaded");

        Self::assemble(config.clone(), store, registry).await
    }

    /// Build the service graph over an existing store
    ///
    /// Recovery always runs here, before the orchestrator can accept a
    /// trigger.
    pub async fn assemble(
        config: Config,
        store: Arc<dyn Store>,
        registry: VendorRegistry,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let gate = Arc::new(ConcurrencyGate::new(config.max_concurrent_requests));

        let recovery = RecoveryManager::new(store.clone()).run(&registry).await?;
        tracing::info!(
            interrupted = recovery.interrupted().len(),
            seeded = recovery.seeded().len(),
            "Startup recovery finished"
        );

        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            registry.clone(),
            gate.clone(),
            &recovery,
        ));
        let reconciler = Arc::new(AsnReconciler::new(store.clone(), gate.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            registry,
            gate,
            orchestrator,
            reconciler,
        })
    }

    /// Spawn the sync scheduler
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let scheduler = SyncScheduler::new(
            self.orchestrator.clone(),
            self.config.scheduler_tick(),
            tasks.shutdown_token(),
        );
        tasks.spawn("sync_scheduler", TaskKind::Periodic, scheduler.run());

        tasks.log_summary();
        tasks
    }
}
