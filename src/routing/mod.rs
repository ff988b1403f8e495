//! Shard routing for queries: classifying cluster states, grouping shard
//! locations and waiting for missing shards to come online.

pub mod attempt;
pub mod grouper;
pub mod pending;
pub mod policy;
pub mod predicate;
pub mod resolver;
pub mod sharded_table;
pub mod table;

pub use attempt::{AttemptOutcome, RoutingAttempt};
pub use grouper::ShardLocationGrouper;
pub use pending::{PendingResolution, PendingResolutionInfo};
pub use policy::PartitionAwarenessPolicy;
pub use predicate::RoutingPredicate;
pub use resolver::{Resolution, RoutingResolver};
pub use sharded_table::{ShardedTable, TableRouter};
pub use table::{MissingShardSet, PhysicalIndexSet, RoutingTable, ShardLocation};
