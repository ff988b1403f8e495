use super::service::ClusterMembershipService;
use super::state::ClusterSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

/// Outcome of waiting for a cluster state change.
#[derive(Debug, Clone)]
pub enum ObservedChange {
    /// A published state satisfied the predicate.
    NewState(Arc<ClusterSnapshot>),
    /// The deadline elapsed first.
    TimedOut,
    /// The membership service shut down.
    ServiceClosed,
}

/// Waits for cluster states matching a predicate, up to a fixed deadline.
///
/// States published while the observer is busy are coalesced: only the latest
/// one is evaluated. States are seen in publication order.
pub struct ClusterStateObserver {
    receiver: watch::Receiver<Arc<ClusterSnapshot>>,
    observed_version: u64,
    deadline: Instant,
}

impl ClusterStateObserver {
    /// Subscribes to `service`, treating `observed` as already evaluated.
    ///
    /// A state published between `observed` and the subscription is evaluated
    /// by the first wait.
    pub fn new(
        service: &dyn ClusterMembershipService,
        observed: &ClusterSnapshot,
        timeout: Duration,
    ) -> Self {
        Self {
            receiver: service.subscribe(),
            observed_version: observed.version(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Waits for the next state newer than anything seen so far.
    ///
    /// States published while the caller was busy collapse into the latest one.
    pub async fn next_change(&mut self) -> ObservedChange {
        loop {
            let state = self.receiver.borrow_and_update().clone();
            if state.version() > self.observed_version {
                self.observed_version = state.version();
                return ObservedChange::NewState(state);
            }
            if self.is_expired() {
                return ObservedChange::TimedOut;
            }

            tokio::select! {
                biased;
                changed = self.receiver.changed() => {
                    if changed.is_err() {
                        return ObservedChange::ServiceClosed;
                    }
                }
                _ = sleep_until(self.deadline) => {
                    return ObservedChange::TimedOut;
                }
            }
        }
    }

    /// Waits for the next state newer than anything evaluated so far for which
    /// `predicate` holds.
    pub async fn wait_for_change<P>(&mut self, mut predicate: P) -> ObservedChange
    where
        P: FnMut(&ClusterSnapshot) -> bool,
    {
        loop {
            match self.next_change().await {
                ObservedChange::NewState(state) => {
                    if predicate(&state) {
                        return ObservedChange::NewState(state);
                    }
                    if self.is_expired() {
                        return ObservedChange::TimedOut;
                    }
                }
                other => return other,
            }
        }
    }
}
