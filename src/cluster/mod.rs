//! The cluster-membership side of routing: snapshots of shard placement, the
//! service publishing them, and observers waiting for them to change.

pub mod in_memory;
pub mod observer;
pub mod operation_routing;
pub mod preference;
pub mod service;
pub mod shard_hash;
pub mod state;

pub use in_memory::InMemoryClusterService;
pub use observer::{ClusterStateObserver, ObservedChange};
pub use operation_routing::{RoutingHints, ShardIterator, resolve_search_routing, search_shards};
pub use preference::Preference;
pub use service::ClusterMembershipService;
pub use shard_hash::shard_for_routing;
pub use state::{ClusterSnapshot, IndexRoutingTable, ShardRouting, ShardRoutingState};
