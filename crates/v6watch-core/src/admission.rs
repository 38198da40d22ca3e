//! Admission control: a fixed-capacity permit pool bounding how many
//! capability checks run at once.
//!
//! Every check task acquires a permit before resolving or probing and holds
//! it until its snapshot has been forwarded. The permit is an RAII guard, so
//! release happens on every exit path, including early DNS-failure
//! termination. Forwarding a finished snapshot never requires a permit.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool of fixed capacity.
#[derive(Debug, Clone)]
pub struct AdmissionPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one check run; dropping it returns the permit.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits until a permit is free. Never fails: the semaphore is only
    /// closed when the pool itself is dropped.
    pub async fn admit(&self) -> AdmissionPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("admission semaphore closed");
        AdmissionPermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free. Used by tests and status reporting.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
