//! Trigger surface: turns "domain added" / "re-check requested" events into
//! bounded, independently scheduled check tasks.
//!
//! Collaborators are injected explicitly and share one lifecycle: built at
//! process start, torn down when the last [`Tracker`] clone drops and the
//! writer task is closed. Each task moves through
//! admit → seed → resolve/probe → forward, and its admission permit is an
//! RAII guard, so it is released exactly once on every exit path.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::admission::AdmissionPool;
use crate::aggregator;
use crate::probe::Probe;
use crate::resolver::ResolveHost;
use crate::store::CapabilityStore;
use crate::writer::{SnapshotWriter, WriterTask};

/// Capability check scheduler. Cheap to clone; all clones share the same
/// admission pool and writer queue.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn CapabilityStore>,
    resolver: Arc<dyn ResolveHost>,
    prober: Arc<dyn Probe>,
    pool: AdmissionPool,
    writer: SnapshotWriter,
}

impl Tracker {
    /// Wire a tracker from its collaborators. `max_concurrent_checks` bounds
    /// how many check runs execute at once. The returned [`WriterTask`] must
    /// be closed after all tracker clones are dropped so queued snapshots
    /// reach storage.
    pub fn new(
        store: Arc<dyn CapabilityStore>,
        resolver: Arc<dyn ResolveHost>,
        prober: Arc<dyn Probe>,
        max_concurrent_checks: usize,
    ) -> (Self, WriterTask) {
        let (writer, writer_task) = SnapshotWriter::spawn(Arc::clone(&store));
        let tracker = Tracker {
            store,
            resolver,
            prober,
            pool: AdmissionPool::new(max_concurrent_checks),
            writer,
        };
        (tracker, writer_task)
    }

    /// Spawn one capability check for a registered domain. Never blocks the
    /// caller; the task itself waits for an admission permit. The task
    /// forwards exactly one snapshot unless the domain is unregistered or
    /// the seed read fails.
    pub fn spawn_check(&self, domain: &str) -> JoinHandle<()> {
        let domain = domain.to_string();
        let store = Arc::clone(&self.store);
        let resolver = Arc::clone(&self.resolver);
        let prober = Arc::clone(&self.prober);
        let pool = self.pool.clone();
        let writer = self.writer.clone();

        tokio::spawn(async move {
            let permit = pool.admit().await;

            let seed = match store.fetch(&domain).await {
                Ok(Some(seed)) => seed,
                Ok(None) => {
                    tracing::warn!(domain, "check requested for unregistered domain");
                    return;
                }
                Err(err) => {
                    tracing::error!(domain, %err, "failed to read stored record");
                    return;
                }
            };

            let snapshot = aggregator::run_check(resolver.as_ref(), prober.as_ref(), seed).await;
            tracing::info!(
                domain,
                ipv6 = snapshot.supports_ipv6(),
                "capability check finished"
            );

            // Forwarding is independent of the permit: the writer queue is
            // unbounded, so a burst of finished checks can never deadlock
            // against the admission bound.
            writer.submit(snapshot);
            drop(permit);
        })
    }

    /// Permit pool capacity, for status output.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }
}
