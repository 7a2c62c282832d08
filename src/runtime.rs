//! Hand-off of freshly built transactions to the thread running them.
//!
//! The audio thread reads the deployed transaction under the same lock a
//! build takes to replace it. Deploys wait at most a bounded time; a deploy
//! that cannot get the lock is skipped and the previous module stays live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::mir::Transaction;

#[derive(Debug, Default)]
pub struct DeploySlot {
    current: Mutex<Option<Arc<Transaction>>>,
    generation: AtomicU64,
}

impl DeploySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the live transaction. Returns `false` and leaves the old one
    /// in place if the lock is not acquired within `timeout`.
    pub fn try_deploy(&self, transaction: Transaction, timeout: Duration) -> bool {
        let Some(mut current) = self.current.try_lock_for(timeout) else {
            warn!(?timeout, "deploy skipped, module is busy");
            return false;
        };
        *current = Some(Arc::new(transaction));

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(generation, "deployed transaction");
        true
    }

    /// Runs `f` with the live transaction while holding the lock.
    pub fn with_current<R>(&self, f: impl FnOnce(Option<&Transaction>) -> R) -> R {
        let current = self.current.lock();
        f(current.as_deref())
    }

    /// Like `with_current` but never waits; `None` if a deploy holds the lock.
    pub fn try_with_current<R>(&self, f: impl FnOnce(Option<&Transaction>) -> R) -> Option<R> {
        let current = self.current.try_lock()?;
        Some(f(current.as_deref()))
    }

    /// A handle to the live transaction that outlives the lock.
    pub fn current(&self) -> Option<Arc<Transaction>> {
        self.current.lock().clone()
    }

    /// Number of successful deploys so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}
