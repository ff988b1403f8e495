// ============================================================================
// shardscope Library
// ============================================================================

//! Partition-aware shard routing.
//!
//! Given table metadata and a query's routing predicate, [`RoutingResolver`]
//! works out which node serves each shard the query has to visit. When some
//! shards are not online yet it waits for the cluster to publish a state in
//! which they are, up to a deadline scaled by the table's partition count.
//!
//! ```
//! use std::sync::Arc;
//! use shardscope::{
//!     ClusterSnapshot, DocTableInfo, InMemoryClusterService, RoutingFetchPolicy,
//!     RoutingPredicate, RoutingResolver, TableIdent,
//! };
//!
//! # fn main() -> shardscope::Result<()> {
//! let mut state = ClusterSnapshot::new();
//! state.add_node("n1")?;
//! state.create_index("orders", 1, 0)?;
//! state.start_shard("orders", 0, "n1")?;
//!
//! let service = Arc::new(InMemoryClusterService::new(state));
//! let resolver = RoutingResolver::new(service, RoutingFetchPolicy::default())?;
//! let table = Arc::new(DocTableInfo::new(TableIdent::in_default_schema("orders")?, 1)?);
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let routing = runtime.block_on(resolver.resolve(table, RoutingPredicate::match_all(), None))?;
//! assert_eq!(routing.shards_on("n1", "orders"), &[0]);
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod core;
pub mod metadata;
pub mod routing;
pub mod scenario;

pub use cluster::{
    ClusterMembershipService, ClusterSnapshot, ClusterStateObserver, InMemoryClusterService,
    ObservedChange, Preference, ShardRouting, ShardRoutingState,
};
pub use config::RoutingFetchPolicy;
pub use core::{NodeId, Result, RoutingError, ShardId};
pub use metadata::{ColumnIdent, DocTableInfo, PartitionFilter, PartitionName, TableIdent};
pub use routing::{
    PendingResolution, Resolution, RoutingPredicate, RoutingResolver, RoutingTable, ShardedTable,
    TableRouter,
};
pub use scenario::RoutingScenario;
