//! Snapshot writer: the single serialized point through which every finished
//! capability snapshot reaches storage.
//!
//! Concurrent check runs never touch storage rows directly; they submit to
//! this writer's queue and move on. One consumer task applies updates
//! strictly in receipt order, which removes the need for per-row locking.
//! The queue is unbounded so a burst of finished checks can never block a
//! check task behind the admission pool's own bound.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::snapshot::CapabilitySnapshot;
use crate::store::CapabilityStore;

/// Sending half handed to check tasks. Cheap to clone; submitting never
/// blocks and never requires an admission permit.
#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<CapabilitySnapshot>,
}

/// Owns the consumer task. Dropping every [`SnapshotWriter`] clone ends the
/// loop once the queue drains; [`WriterTask::close`] waits for that.
pub struct WriterTask {
    handle: JoinHandle<()>,
}

impl SnapshotWriter {
    /// Spawn the consumer loop against a storage collaborator.
    pub fn spawn(store: Arc<dyn CapabilityStore>) -> (SnapshotWriter, WriterTask) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_write_loop(rx, store));
        (SnapshotWriter { tx }, WriterTask { handle })
    }

    /// Queue a finished snapshot for persistence. A full run delivers exactly
    /// one snapshot here; retry policy beyond that belongs to the store.
    pub fn submit(&self, snapshot: CapabilitySnapshot) {
        if self.tx.send(snapshot).is_err() {
            // Only possible during shutdown, after the consumer stopped.
            tracing::error!("snapshot writer is gone; dropping update");
        }
    }
}

impl WriterTask {
    /// Wait for the consumer to drain the queue and exit. Call after all
    /// writer clones have been dropped.
    pub async fn close(self) {
        if let Err(err) = self.handle.await {
            tracing::error!(%err, "snapshot writer task panicked");
        }
    }
}

async fn run_write_loop(
    mut rx: mpsc::UnboundedReceiver<CapabilitySnapshot>,
    store: Arc<dyn CapabilityStore>,
) {
    while let Some(snapshot) = rx.recv().await {
        let domain = snapshot.domain.clone();
        // A lost write would make a capability regression invisible, so this
        // is the one failure class that must be surfaced.
        if let Err(err) = store.apply(&snapshot).await {
            tracing::error!(domain, %err, "failed to persist capability snapshot");
        } else {
            tracing::debug!(domain, "capability snapshot persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Store fake that records updates in arrival order and can stall to
    /// prove updates never interleave.
    struct RecordingStore {
        applied: Mutex<Vec<CapabilitySnapshot>>,
        in_apply: std::sync::atomic::AtomicBool,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                applied: Mutex::new(Vec::new()),
                in_apply: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CapabilityStore for RecordingStore {
        async fn fetch(&self, _domain: &str) -> Result<Option<CapabilitySnapshot>> {
            Ok(None)
        }

        async fn apply(&self, snapshot: &CapabilitySnapshot) -> Result<()> {
            use std::sync::atomic::Ordering;
            assert!(
                !self.in_apply.swap(true, Ordering::SeqCst),
                "two apply calls overlapped"
            );
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.applied.lock().await.push(snapshot.clone());
            self.in_apply.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn updates_are_applied_in_receipt_order() {
        let store = RecordingStore::new();
        let (writer, task) = SnapshotWriter::spawn(store.clone());

        for i in 0..8 {
            writer.submit(CapabilitySnapshot::new(format!("d{i}.test"), ""));
        }
        drop(writer);
        task.close().await;

        let applied = store.applied.lock().await;
        let order: Vec<String> = applied.iter().map(|s| s.domain.clone()).collect();
        let expected: Vec<String> = (0..8).map(|i| format!("d{i}.test")).collect();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn later_enqueued_write_wins() {
        let store = RecordingStore::new();
        let (writer, task) = SnapshotWriter::spawn(store.clone());

        let mut first = CapabilitySnapshot::new("example.test", "");
        first.address_v4 = Some("198.51.100.1".to_string());
        let mut second = CapabilitySnapshot::new("example.test", "");
        second.address_v4 = Some("198.51.100.2".to_string());

        writer.submit(first);
        writer.submit(second);
        drop(writer);
        task.close().await;

        let applied = store.applied.lock().await;
        assert_eq!(applied.len(), 2);
        assert_eq!(
            applied.last().unwrap().address_v4.as_deref(),
            Some("198.51.100.2")
        );
    }

    /// Store fake whose first `apply` fails, to prove a persistence failure
    /// is absorbed by the loop instead of stopping it.
    struct FlakyStore {
        inner: Arc<RecordingStore>,
        failures_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl CapabilityStore for FlakyStore {
        async fn fetch(&self, _domain: &str) -> Result<Option<CapabilitySnapshot>> {
            Ok(None)
        }

        async fn apply(&self, snapshot: &CapabilitySnapshot) -> Result<()> {
            use std::sync::atomic::Ordering;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                anyhow::bail!("disk full");
            }
            self.inner.apply(snapshot).await
        }
    }

    #[tokio::test]
    async fn persistence_failure_is_absorbed_and_later_writes_proceed() {
        let inner = RecordingStore::new();
        let store = Arc::new(FlakyStore {
            inner: inner.clone(),
            failures_left: std::sync::atomic::AtomicUsize::new(1),
        });
        let (writer, task) = SnapshotWriter::spawn(store);

        // The first update attempt fails at the store; each run still gets
        // exactly one attempt, and later snapshots land in order.
        writer.submit(CapabilitySnapshot::new("lost.test", ""));
        writer.submit(CapabilitySnapshot::new("ok1.test", ""));
        writer.submit(CapabilitySnapshot::new("ok2.test", ""));
        drop(writer);
        task.close().await;

        let applied = inner.applied.lock().await;
        let order: Vec<&str> = applied.iter().map(|s| s.domain.as_str()).collect();
        assert_eq!(order, vec!["ok1.test", "ok2.test"]);
    }

    #[tokio::test]
    async fn submit_never_blocks_on_queue_depth() {
        let store = RecordingStore::new();
        let (writer, task) = SnapshotWriter::spawn(store.clone());

        // Far more than any admission pool capacity; all submissions must
        // return immediately even though the consumer is slow.
        for i in 0..100 {
            writer.submit(CapabilitySnapshot::new(format!("burst{i}.test"), ""));
        }
        drop(writer);
        task.close().await;

        assert_eq!(store.applied.lock().await.len(), 100);
    }
}
