use super::attempt::{AttemptOutcome, RoutingAttempt};
use super::pending::{PendingRegistry, PendingResolution, PendingResolutionInfo};
use super::predicate::RoutingPredicate;
use super::table::RoutingTable;
use crate::cluster::{ClusterMembershipService, ClusterStateObserver, ObservedChange, Preference};
use crate::config::RoutingFetchPolicy;
use crate::core::{Result, RoutingError};
use crate::metadata::DocTableInfo;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tokio::task::spawn_blocking;
use tokio::time::timeout_at;
use tracing::{Instrument, Level, event, info_span};

/// Outcome of starting a resolution.
#[derive(Debug)]
pub enum Resolution {
    /// The current cluster state already routes every shard.
    Ready(RoutingTable),
    /// Waiting for missing shards; await the handle for the result.
    Pending(PendingResolution),
}

/// Resolves which node serves which shard of a table for one query, waiting
/// for shards that are not online yet.
///
/// Every cluster state a pending resolution looks at is classified on the
/// blocking pool while holding a permit from a semaphore shared by all of the
/// resolver's pending resolutions. There is no routing cache: every call sees
/// the latest published state.
pub struct RoutingResolver {
    service: Arc<dyn ClusterMembershipService>,
    policy: RoutingFetchPolicy,
    workers: Arc<Semaphore>,
    pending: Arc<PendingRegistry>,
}

impl RoutingResolver {
    pub fn new(service: Arc<dyn ClusterMembershipService>, policy: RoutingFetchPolicy) -> Result<Self> {
        policy.validate()?;
        let workers = Arc::new(Semaphore::new(policy.max_concurrent_attempts));
        Ok(Self {
            service,
            policy,
            workers,
            pending: Arc::new(PendingRegistry::new()),
        })
    }

    pub fn policy(&self) -> &RoutingFetchPolicy {
        &self.policy
    }

    pub fn service(&self) -> &Arc<dyn ClusterMembershipService> {
        &self.service
    }

    /// How long a resolution for `table` waits for missing shards.
    pub fn fetch_timeout(&self, table: &DocTableInfo) -> Duration {
        self.policy.fetch_timeout(table.partition_count())
    }

    /// Resolves the routing for `table`, waiting for shards to come online if
    /// necessary.
    pub async fn resolve(
        &self,
        table: Arc<DocTableInfo>,
        predicate: RoutingPredicate,
        preference: Option<Preference>,
    ) -> Result<RoutingTable> {
        match self.start(table, predicate, preference)? {
            Resolution::Ready(routing) => Ok(routing),
            Resolution::Pending(pending) => pending.await,
        }
    }

    /// Runs the fast path on the current state and, if shards are missing,
    /// starts watching the cluster. Must be called within a tokio runtime.
    pub fn start(
        &self,
        table: Arc<DocTableInfo>,
        predicate: RoutingPredicate,
        preference: Option<Preference>,
    ) -> Result<Resolution> {
        let timeout = self.fetch_timeout(&table);
        self.start_with_timeout(table, predicate, preference, timeout)
    }

    pub(crate) fn start_with_timeout(
        &self,
        table: Arc<DocTableInfo>,
        predicate: RoutingPredicate,
        preference: Option<Preference>,
        timeout: Duration,
    ) -> Result<Resolution> {
        let table_name = table.ident().fqn();
        let span = info_span!(
            "routing.resolve",
            table = %table_name,
            partitions = table.partition_count()
        );
        let _enter = span.enter();

        let attempt = RoutingAttempt::new(table, predicate, preference);
        let state = self.service.current_state();
        let missing = match attempt.run(self.service.as_ref(), &state) {
            Ok(AttemptOutcome::Complete(routing)) => {
                event!(
                    Level::DEBUG,
                    version = state.version(),
                    nodes = routing.node_count(),
                    "routing resolved from current state"
                );
                return Ok(Resolution::Ready(routing));
            }
            Ok(AttemptOutcome::Incomplete(missing)) => missing,
            Err(err) => {
                event!(Level::WARN, error = %err, "routing failed on current state");
                return Err(err);
            }
        };

        let runtime = Handle::try_current().map_err(|err| {
            RoutingError::ExecutionError(format!("routing watch needs a tokio runtime: {}", err))
        })?;
        event!(
            Level::INFO,
            version = state.version(),
            missing = missing.len(),
            first_missing = ?missing.first(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "waiting for shards to come online"
        );

        let observer = ClusterStateObserver::new(self.service.as_ref(), &state, timeout);
        let deadline = observer.deadline();
        let (sender, receiver) = oneshot::channel();
        let watch = WatchTask {
            service: self.service.clone(),
            attempt,
            observer,
            workers: self.workers.clone(),
            table: table_name.clone(),
            timeout,
        };
        let registry = self.pending.clone();
        let task_span = span.clone();
        let id = self.pending.register(&table_name, timeout, move |id| {
            runtime.spawn(
                async move {
                    let result = watch.run().await;
                    registry.complete(id);
                    match &result {
                        Ok(routing) => event!(
                            Level::INFO,
                            nodes = routing.node_count(),
                            shards = routing.shard_count(),
                            "shards came online"
                        ),
                        Err(err) => event!(Level::WARN, error = %err, "routing watch failed"),
                    }
                    let _ = sender.send(result);
                }
                .instrument(task_span),
            )
        })?;

        Ok(Resolution::Pending(PendingResolution::new(
            id,
            table_name,
            deadline,
            receiver,
            self.pending.clone(),
        )))
    }

    /// Number of resolutions still waiting for shards.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_resolutions(&self) -> Result<Vec<PendingResolutionInfo>> {
        self.pending.snapshot()
    }

    /// Cancels every pending resolution; their handles resolve to
    /// `Cancelled`. Returns how many were cancelled.
    pub fn cancel_all(&self) -> Result<usize> {
        let cancelled = self.pending.cancel_all()?;
        if cancelled > 0 {
            event!(Level::INFO, cancelled, "cancelled pending routing resolutions");
        }
        Ok(cancelled)
    }
}

/// State owned by one watching resolution.
struct WatchTask {
    service: Arc<dyn ClusterMembershipService>,
    attempt: RoutingAttempt,
    observer: ClusterStateObserver,
    workers: Arc<Semaphore>,
    table: String,
    timeout: Duration,
}

impl WatchTask {
    /// Classifies each newly published state under a worker permit until one
    /// completes the routing or fails it.
    async fn run(mut self) -> Result<RoutingTable> {
        loop {
            let state = match self.observer.next_change().await {
                ObservedChange::NewState(state) => state,
                ObservedChange::TimedOut => return Err(self.timed_out()),
                ObservedChange::ServiceClosed => {
                    return Err(RoutingError::RoutingUnavailable(self.table.clone()));
                }
            };

            let permit = self.acquire_worker().await?;
            let service = self.service.clone();
            let attempt = self.attempt.clone();
            let classified = Arc::clone(&state);
            let outcome = spawn_blocking(move || {
                let _permit = permit;
                attempt.run(service.as_ref(), &classified)
            })
            .await
            .map_err(|err| {
                RoutingError::ExecutionError(format!("routing classification failed: {}", err))
            })??;

            match outcome {
                AttemptOutcome::Complete(routing) => return Ok(routing),
                AttemptOutcome::Incomplete(missing) => {
                    event!(
                        Level::DEBUG,
                        version = state.version(),
                        missing = missing.len(),
                        "shards still missing, waiting for next state"
                    );
                }
            }
        }
    }

    async fn acquire_worker(&self) -> Result<OwnedSemaphorePermit> {
        timeout_at(self.observer.deadline(), self.workers.clone().acquire_owned())
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|_| RoutingError::ExecutionError("routing worker pool closed".to_string()))
    }

    fn timed_out(&self) -> RoutingError {
        RoutingError::RoutingTimeout {
            table: self.table.clone(),
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
