//! Vendor synchronization jobs

mod orchestrator;
mod scheduler;

pub use orchestrator::{SyncError, SyncOrchestrator, SyncReport};
pub use scheduler::SyncScheduler;
