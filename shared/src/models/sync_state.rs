//! Vendor sync state machine
//!
//! ```text
//!            Trigger                Succeed
//!   Idle ───────────► InProgress ───────────► Completed
//!    ▲                  │    ▲                    │
//!    │ ClearError       │    └──── Trigger ───────┘
//!    │          Fail /  │
//!    │       Interrupt  ▼
//!    └────────────── Error ───── Trigger ──► InProgress
//! ```
//!
//! [`SyncStatus::apply`] is the only place a new status is computed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::vendor::{SyncStrategy, VendorId};

/// Status of a vendor's sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    InProgress,
    Completed,
    Error,
}

/// Input to the sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEvent {
    /// Manual or scheduled start
    Trigger,
    /// Strategy finished (even with zero changes)
    Succeed,
    /// Job-level failure during fetch or merge
    Fail,
    /// Found in progress at startup
    Interrupt,
    /// Operator acknowledged the error
    ClearError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("sync already in progress")]
    AlreadyRunning,

    #[error("cannot apply {event:?} while {from}")]
    Invalid { from: SyncStatus, event: SyncEvent },
}

impl SyncStatus {
    /// Compute the next status for `event`
    pub fn apply(self, event: SyncEvent) -> Result<SyncStatus, TransitionError> {
        use SyncEvent as E;
        use SyncStatus as S;

        match (self, event) {
            (S::Idle | S::Completed | S::Error, E::Trigger) => Ok(S::InProgress),
            (S::InProgress, E::Trigger) => Err(TransitionError::AlreadyRunning),

            (S::InProgress, E::Succeed) => Ok(S::Completed),
            (S::InProgress, E::Fail | E::Interrupt) => Ok(S::Error),

            (S::Error, E::ClearError) => Ok(S::Idle),
            (S::Idle, E::ClearError) => Ok(S::Idle),
            (S::Completed, E::ClearError) => Ok(S::Completed),

            (S::Idle | S::Completed | S::Error, E::Succeed | E::Fail | E::Interrupt)
            | (S::InProgress, E::ClearError) => Err(TransitionError::Invalid { from: self, event }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Error => "error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SyncStatus::InProgress)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counters reported to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl SyncStats {
    pub fn absorb(&mut self, other: &SyncStats) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Persisted sync state, exactly one per registered vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorSyncState {
    pub vendor_id: VendorId,
    pub status: SyncStatus,
    /// Strategy of the most recent trigger
    pub strategy: Option<SyncStrategy>,
    /// Human-readable diagnostic of the last job-level failure
    pub last_error: Option<String>,
    /// Last time a job started or finished (Unix millis)
    pub last_run_at: Option<i64>,
    /// Start time of the current/most recent job
    pub started_at: Option<i64>,
    /// Start time of the most recent successful job (incremental watermark)
    pub last_success_at: Option<i64>,
    /// Opaque delta cursor handed back by the vendor feed
    pub delta_cursor: Option<String>,
    /// Counters of the most recent finished job
    pub last_stats: Option<SyncStats>,
}

impl VendorSyncState {
    pub fn new(vendor_id: VendorId) -> Self {
        Self {
            vendor_id,
            status: SyncStatus::Idle,
            strategy: None,
            last_error: None,
            last_run_at: None,
            started_at: None,
            last_success_at: None,
            delta_cursor: None,
            last_stats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_from_resting_states() {
        for status in [SyncStatus::Idle, SyncStatus::Completed, SyncStatus::Error] {
            assert_eq!(status.apply(SyncEvent::Trigger), Ok(SyncStatus::InProgress));
        }
    }

    #[test]
    fn test_trigger_while_running_is_rejected() {
        assert_eq!(
            SyncStatus::InProgress.apply(SyncEvent::Trigger),
            Err(TransitionError::AlreadyRunning)
        );
    }

    #[test]
    fn test_finish_transitions() {
        assert_eq!(
            SyncStatus::InProgress.apply(SyncEvent::Succeed),
            Ok(SyncStatus::Completed)
        );
        assert_eq!(
            SyncStatus::InProgress.apply(SyncEvent::Fail),
            Ok(SyncStatus::Error)
        );
        assert_eq!(
            SyncStatus::InProgress.apply(SyncEvent::Interrupt),
            Ok(SyncStatus::Error)
        );
    }

    #[test]
    fn test_error_requires_explicit_clear() {
        assert_eq!(SyncStatus::Error.apply(SyncEvent::ClearError), Ok(SyncStatus::Idle));
        assert!(matches!(
            SyncStatus::Error.apply(SyncEvent::Succeed),
            Err(TransitionError::Invalid { .. })
        ));
        assert!(matches!(
            SyncStatus::InProgress.apply(SyncEvent::ClearError),
            Err(TransitionError::Invalid { .. })
        ));
    }

    #[test]
    fn test_finish_events_outside_a_run_are_invalid() {
        assert!(SyncStatus::Idle.apply(SyncEvent::Succeed).is_err());
        assert!(SyncStatus::Completed.apply(SyncEvent::Interrupt).is_err());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let state = VendorSyncState::new(VendorId::from("acme"));
        let json = serde_json::to_string(&state).unwrap();
        let back: VendorSyncState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
