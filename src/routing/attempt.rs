use super::grouper::ShardLocationGrouper;
use super::policy::PartitionAwarenessPolicy;
use super::predicate::RoutingPredicate;
use super::table::{MissingShardSet, PhysicalIndexSet, RoutingTable, ShardLocation};
use crate::cluster::{ClusterMembershipService, ClusterSnapshot, Preference, ShardIterator};
use crate::core::{Result, RoutingError};
use crate::metadata::DocTableInfo;
use std::sync::Arc;

/// Result of probing one cluster snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every required shard had an active location.
    Complete(RoutingTable),
    /// Some shards are not routable yet; never empty.
    Incomplete(MissingShardSet),
}

impl AttemptOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// One synchronous routing classification for a table, predicate and preference.
///
/// Cheap to clone; the same attempt is re-run against every candidate state
/// while a resolution waits.
#[derive(Debug, Clone)]
pub struct RoutingAttempt {
    table: Arc<DocTableInfo>,
    predicate: RoutingPredicate,
    preference: Option<Preference>,
}

impl RoutingAttempt {
    pub fn new(
        table: Arc<DocTableInfo>,
        predicate: RoutingPredicate,
        preference: Option<Preference>,
    ) -> Self {
        Self {
            table,
            predicate,
            preference,
        }
    }

    pub fn table(&self) -> &DocTableInfo {
        &self.table
    }

    pub fn predicate(&self) -> &RoutingPredicate {
        &self.predicate
    }

    pub fn preference(&self) -> Option<&Preference> {
        self.preference.as_ref()
    }

    /// The predicate's partitions when it names any, else every concrete index.
    pub fn physical_indices(&self) -> PhysicalIndexSet {
        match self.predicate.partitions() {
            Some(partitions) => PhysicalIndexSet::new(partitions.iter().cloned()),
            None => PhysicalIndexSet::new(self.table.concrete_indices()),
        }
    }

    /// Classifies every required shard against `state`.
    ///
    /// Missing indices mean there is nothing to search and yield empty
    /// routing. Fails with `ShardsUnavailable` when a shard of an
    /// unpartitioned table has no location candidate at all.
    pub fn run(
        &self,
        service: &dyn ClusterMembershipService,
        state: &ClusterSnapshot,
    ) -> Result<AttemptOutcome> {
        let indices = self.physical_indices();
        if indices.is_empty() {
            return Ok(AttemptOutcome::Complete(RoutingTable::empty()));
        }

        let iterators = match self.shard_iterators(service, state, &indices) {
            Ok(iterators) => iterators,
            Err(RoutingError::IndexNotFound(_)) => {
                return Ok(AttemptOutcome::Complete(RoutingTable::empty()));
            }
            Err(err) => return Err(err),
        };

        let mut locations = Vec::with_capacity(iterators.len());
        let mut missing = MissingShardSet::new();
        for mut iterator in iterators {
            match iterator.next() {
                Some(copy) if copy.active() => match copy.node_id {
                    Some(node_id) => {
                        locations.push(ShardLocation::new(node_id, copy.index, copy.shard));
                    }
                    None => {
                        missing.insert(iterator.shard_id().clone());
                    }
                },
                Some(_) => {
                    missing.insert(iterator.shard_id().clone());
                }
                None => {
                    if PartitionAwarenessPolicy::tolerate_missing_shard(self.table.is_partitioned())
                    {
                        missing.insert(iterator.shard_id().clone());
                    } else {
                        return Err(RoutingError::ShardsUnavailable(iterator.shard_id().clone()));
                    }
                }
            }
        }

        if missing.is_empty() {
            Ok(AttemptOutcome::Complete(ShardLocationGrouper::group(locations)))
        } else {
            Ok(AttemptOutcome::Incomplete(missing))
        }
    }

    fn shard_iterators(
        &self,
        service: &dyn ClusterMembershipService,
        state: &ClusterSnapshot,
        indices: &PhysicalIndexSet,
    ) -> Result<Vec<ShardIterator>> {
        let hints = match self.predicate.routing_values() {
            Some(values) => Some(service.resolve_routing_hints(state, values, indices.as_slice())?),
            None => None,
        };
        service.shard_iterators(
            state,
            indices.as_slice(),
            hints.as_ref(),
            self.preference.as_ref(),
        )
    }
}
