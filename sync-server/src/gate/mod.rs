//! Outbound request gate
//!
//! Caps the number of vendor calls in flight. Waiting tasks are admitted in
//! submission order (tokio's semaphore is fair). [`ConcurrencyGate::clear`]
//! rejects every task that has not started yet; tasks already holding a
//! permit run to completion.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// A queued task was dropped by [`ConcurrencyGate::clear`] before it started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled before it started")]
pub struct GateCancelled;

impl From<GateCancelled> for AppError {
    fn from(err: GateCancelled) -> Self {
        AppError::with_message(ErrorCode::RequestCancelled, err.to_string())
    }
}

pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    /// Cancelled and replaced on every `clear()`
    generation: Mutex<CancellationToken>,
    waiting: AtomicUsize,
}

/// Keeps the waiting counter honest even when a `submit` future is dropped
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    /// `max_concurrent` below 1 is treated as 1
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            generation: Mutex::new(CancellationToken::new()),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Run `task` once a slot is free
    ///
    /// The closure is only invoked after admission, so a task rejected by
    /// `clear()` never starts. The task's own error is returned unchanged;
    /// it does not affect other submissions.
    pub async fn submit<F, Fut, T, E>(&self, task: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<GateCancelled>,
    {
        let token = self.generation.lock().clone();

        let permit = {
            let _waiting = WaitingGuard::enter(&self.waiting);
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = self.permits.acquire() => permit.ok(),
            }
        };

        let Some(_permit) = permit else {
            return Err(GateCancelled.into());
        };
        task().await
    }

    /// Reject every task still waiting for a slot, returning how many were queued
    pub fn clear(&self) -> usize {
        let mut generation = self.generation.lock();
        let rejected = self.waiting.load(Ordering::SeqCst);
        generation.cancel();
        *generation = CancellationToken::new();

        if rejected > 0 {
            tracing::warn!(rejected, "Cleared pending vendor requests");
        }
        rejected
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Tasks queued behind the limit
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}
