use super::operation_routing::{self, RoutingHints, ShardIterator};
use super::preference::Preference;
use super::state::ClusterSnapshot;
use crate::core::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// The cluster-membership and shard-allocation service the resolver consults.
///
/// Implementations publish immutable snapshots through a watch channel;
/// dropping the channel's sender signals that the service shut down.
pub trait ClusterMembershipService: Send + Sync {
    /// The most recently published snapshot.
    fn current_state(&self) -> Arc<ClusterSnapshot>;

    /// A receiver for future snapshots. The current snapshot counts as seen.
    fn subscribe(&self) -> watch::Receiver<Arc<ClusterSnapshot>>;

    /// Resolves the routing values to search each index with.
    fn resolve_routing_hints(
        &self,
        state: &ClusterSnapshot,
        routing_values: &BTreeSet<String>,
        indices: &[String],
    ) -> Result<RoutingHints> {
        operation_routing::resolve_search_routing(state, routing_values, indices)
    }

    /// Returns one iterator of candidate copies per shard to search.
    fn shard_iterators(
        &self,
        state: &ClusterSnapshot,
        indices: &[String],
        hints: Option<&RoutingHints>,
        preference: Option<&Preference>,
    ) -> Result<Vec<ShardIterator>> {
        operation_routing::search_shards(state, indices, hints, preference)
    }
}
