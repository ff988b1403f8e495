use super::table::RoutingTable;
use crate::core::{Result, RoutingError};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

/// Snapshot of one in-flight resolution, for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingResolutionInfo {
    pub id: u64,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub timeout_ms: u64,
}

struct PendingEntry {
    info: PendingResolutionInfo,
    abort: AbortHandle,
}

/// In-flight resolutions of one resolver, keyed by id.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, PendingEntry>>,
}

impl PendingRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns the watch task for a new resolution and records it.
    ///
    /// The registry lock is held while spawning so the task cannot
    /// deregister itself before it was registered.
    pub(crate) fn register<F>(
        &self,
        table: &str,
        timeout: Duration,
        spawn: F,
    ) -> Result<u64>
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entries = self.entries.lock()?;
        let handle = spawn(id);
        entries.insert(
            id,
            PendingEntry {
                info: PendingResolutionInfo {
                    id,
                    table: table.to_string(),
                    started_at: Utc::now(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                abort: handle.abort_handle(),
            },
        );
        Ok(id)
    }

    /// Forgets a finished resolution.
    pub(crate) fn complete(&self, id: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&id);
        }
    }

    /// Forgets a resolution and stops its task. Returns false if it had
    /// already finished.
    pub(crate) fn cancel(&self, id: u64) -> bool {
        let entry = match self.entries.lock() {
            Ok(mut entries) => entries.remove(&id),
            Err(_) => None,
        };
        match entry {
            Some(entry) => {
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) -> Result<usize> {
        let drained = self.entries.lock()?.drain().map(|(_, entry)| entry).collect::<Vec<_>>();
        for entry in &drained {
            entry.abort.abort();
        }
        Ok(drained.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub(crate) fn snapshot(&self) -> Result<Vec<PendingResolutionInfo>> {
        let entries = self.entries.lock()?;
        let mut infos = entries
            .values()
            .map(|entry| entry.info.clone())
            .collect::<Vec<_>>();
        infos.sort_by_key(|info| info.id);
        Ok(infos)
    }
}

/// A resolution waiting for shards to come online.
///
/// Resolves to the routing table or the terminal error. Dropping it cancels
/// the resolution and releases its subscription.
#[must_use = "dropping a pending resolution cancels it"]
pub struct PendingResolution {
    id: u64,
    table: String,
    deadline: Instant,
    receiver: oneshot::Receiver<Result<RoutingTable>>,
    registry: Arc<PendingRegistry>,
}

impl PendingResolution {
    pub(crate) fn new(
        id: u64,
        table: String,
        deadline: Instant,
        receiver: oneshot::Receiver<Result<RoutingTable>>,
        registry: Arc<PendingRegistry>,
    ) -> Self {
        Self {
            id,
            table,
            deadline,
            receiver,
            registry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Stops waiting. No result is delivered afterwards.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for PendingResolution {
    type Output = Result<RoutingTable>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RoutingError::Cancelled(self.table.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingResolution {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}

impl std::fmt::Debug for PendingResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResolution")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_tracks_and_cancels_tasks() {
        let registry = PendingRegistry::new();
        let (mut tx, rx) = oneshot::channel::<()>();
        let id = registry
            .register("doc.t", Duration::from_secs(5), |_| {
                tokio::spawn(async move {
                    let _ = rx.await;
                })
            })
            .unwrap();

        assert_eq!(registry.len(), 1);
        let infos = registry.snapshot().unwrap();
        assert_eq!(infos[0].id, id);
        assert_eq!(infos[0].table, "doc.t");
        assert_eq!(infos[0].timeout_ms, 5_000);

        assert!(registry.cancel(id));
        assert!(!registry.cancel(id));
        assert_eq!(registry.len(), 0);
        tx.closed().await;
    }

    #[tokio::test]
    async fn dropped_sender_reads_as_cancelled() {
        let registry = Arc::new(PendingRegistry::new());
        let (tx, rx) = oneshot::channel();
        let pending = PendingResolution::new(7, "doc.t".to_string(), Instant::now(), rx, registry);
        drop(tx);
        assert_eq!(
            pending.now_or_never().unwrap(),
            Err(RoutingError::Cancelled("doc.t".to_string()))
        );
    }

    #[tokio::test]
    async fn delivered_result_is_returned() {
        let registry = Arc::new(PendingRegistry::new());
        let (tx, rx) = oneshot::channel();
        let pending = PendingResolution::new(1, "doc.t".to_string(), Instant::now(), rx, registry);
        tx.send(Ok(RoutingTable::empty())).unwrap();
        assert_eq!(pending.await, Ok(RoutingTable::empty()));
    }
}
