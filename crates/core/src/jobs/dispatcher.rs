// crates/core/src/jobs/dispatcher.rs
//! Admission control: bounds how many jobs run at once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds concurrently running jobs to a fixed capacity.
///
/// Queued submissions are admitted strictly in the order they asked:
/// the semaphore's acquire queue is FIFO-fair, so admission order is
/// submission order. Capacity `0` means unbounded: every job is admitted
/// immediately.
pub struct Dispatcher {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of execution concurrency. A running job owns exactly one slot;
/// dropping it releases the slot to the next queued job.
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let permits = if capacity == 0 {
            Semaphore::MAX_PERMITS
        } else {
            capacity
        };
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            capacity,
        }
    }

    /// Wait until a worker slot is free, then claim it.
    pub async fn admit(&self) -> WorkerSlot {
        // The semaphore is owned by the dispatcher and never closed.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("dispatcher semaphore is never closed");
        WorkerSlot { _permit: permit }
    }

    /// Configured capacity; `0` means unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
