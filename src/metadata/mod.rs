//! Table metadata consumed by the routing resolver.

pub mod ident;
pub mod partition;
pub mod table;

pub use ident::{ColumnIdent, DEFAULT_SCHEMA, TableIdent};
pub use partition::{PARTITIONED_TABLE_PREFIX, PartitionDescriptor, PartitionFilter, PartitionName};
pub use table::DocTableInfo;
