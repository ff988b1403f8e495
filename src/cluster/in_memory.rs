use super::service::ClusterMembershipService;
use super::state::ClusterSnapshot;
use crate::core::{Result, RoutingError};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

type SnapshotSender = watch::Sender<Arc<ClusterSnapshot>>;

/// An in-process membership service that publishes snapshots on demand.
///
/// Every publication gets the next version number. Used for tests, tooling
/// and single-process deployments.
pub struct InMemoryClusterService {
    sender: Mutex<Option<SnapshotSender>>,
    receiver: watch::Receiver<Arc<ClusterSnapshot>>,
}

impl InMemoryClusterService {
    /// Starts the service with `initial` as the first published state.
    pub fn new(mut initial: ClusterSnapshot) -> Self {
        let version = initial.version().max(1);
        initial.stamp(version);
        let (sender, receiver) = watch::channel(Arc::new(initial));
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Publishes `snapshot` as the next version.
    pub fn publish(&self, snapshot: ClusterSnapshot) -> Result<Arc<ClusterSnapshot>> {
        let guard = self.sender.lock()?;
        self.publish_locked(&guard, snapshot)
    }

    /// Applies `change` to a copy of the current state and publishes the result.
    ///
    /// Nothing is published if `change` fails. Concurrent updates are applied
    /// one after another.
    pub fn update<F>(&self, change: F) -> Result<Arc<ClusterSnapshot>>
    where
        F: FnOnce(&mut ClusterSnapshot) -> Result<()>,
    {
        let guard = self.sender.lock()?;
        let mut next = (**self.receiver.borrow()).clone();
        change(&mut next)?;
        self.publish_locked(&guard, next)
    }

    /// Shuts the service down; subscribers observe the closed channel.
    pub fn close(&self) -> Result<()> {
        if self.sender.lock()?.take().is_some() {
            info!("cluster service closed at version {}", self.receiver.borrow().version());
        }
        Ok(())
    }

    /// Number of live subscriptions, not counting the service's own receiver.
    /// Zero once the service is closed.
    pub fn subscriber_count(&self) -> usize {
        match self.sender.lock() {
            Ok(guard) => guard
                .as_ref()
                .map(|sender| sender.receiver_count().saturating_sub(1))
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.has_changed().is_err()
    }

    fn publish_locked(
        &self,
        guard: &MutexGuard<'_, Option<SnapshotSender>>,
        mut snapshot: ClusterSnapshot,
    ) -> Result<Arc<ClusterSnapshot>> {
        let sender = guard.as_ref().ok_or_else(|| {
            RoutingError::ExecutionError("cluster service is closed".to_string())
        })?;
        let version = self.receiver.borrow().version().saturating_add(1);
        snapshot.stamp(version);
        let snapshot = Arc::new(snapshot);
        sender.send_replace(snapshot.clone());
        debug!(
            "published cluster state version {} ({} nodes, uuid {})",
            version,
            snapshot.nodes().len(),
            snapshot.state_uuid()
        );
        Ok(snapshot)
    }
}

impl ClusterMembershipService for InMemoryClusterService {
    fn current_state(&self) -> Arc<ClusterSnapshot> {
        self.receiver.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ClusterSnapshot>> {
        match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(sender) => sender.subscribe(),
                None => self.receiver.clone(),
            },
            Err(_) => self.receiver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_bump_versions() {
        let service = InMemoryClusterService::new(ClusterSnapshot::new());
        let first = service.current_state();
        assert_eq!(first.version(), 1);

        let second = service.update(|state| state.add_node("n1")).unwrap();
        assert_eq!(second.version(), 2);
        assert_ne!(first.state_uuid(), second.state_uuid());
        assert!(service.current_state().nodes().contains("n1"));
    }

    #[test]
    fn failed_update_publishes_nothing() {
        let service = InMemoryClusterService::new(ClusterSnapshot::new());
        let err = service
            .update(|state| state.start_shard("missing", 0, "n1"))
            .unwrap_err();
        assert!(matches!(err, RoutingError::IndexNotFound(_)));
        assert_eq!(service.current_state().version(), 1);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let service = InMemoryClusterService::new(ClusterSnapshot::new());
        assert_eq!(service.subscriber_count(), 0);
        let first = service.subscribe();
        let second = service.subscribe();
        assert_eq!(service.subscriber_count(), 2);
        drop(first);
        assert_eq!(service.subscriber_count(), 1);
        service.close().unwrap();
        assert_eq!(service.subscriber_count(), 0);
        drop(second);
    }

    #[tokio::test]
    async fn subscribers_observe_close() {
        let service = InMemoryClusterService::new(ClusterSnapshot::new());
        let mut receiver = service.subscribe();
        service.close().unwrap();
        assert!(service.is_closed());
        assert!(receiver.changed().await.is_err());
        assert!(service.publish(ClusterSnapshot::new()).is_err());
    }
}
