use super::predicate::RoutingPredicate;
use super::resolver::{Resolution, RoutingResolver};
use super::table::RoutingTable;
use crate::cluster::Preference;
use crate::core::Result;
use crate::metadata::{DocTableInfo, TableIdent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A table whose rows are spread over shards on cluster nodes.
#[async_trait]
pub trait ShardedTable: Send + Sync {
    fn ident(&self) -> &TableIdent;

    fn shard_count(&self) -> u32;

    /// Locates every shard a query with `predicate` has to visit.
    async fn routing(
        &self,
        predicate: &RoutingPredicate,
        preference: Option<&Preference>,
    ) -> Result<RoutingTable>;
}

/// Routes queries for one table through a shared resolver.
pub struct TableRouter {
    table: Arc<DocTableInfo>,
    resolver: Arc<RoutingResolver>,
    fetch_timeout: Duration,
}

impl TableRouter {
    pub fn new(table: Arc<DocTableInfo>, resolver: Arc<RoutingResolver>) -> Self {
        let fetch_timeout = resolver.fetch_timeout(&table);
        Self {
            table,
            resolver,
            fetch_timeout,
        }
    }

    pub fn table(&self) -> &DocTableInfo {
        &self.table
    }

    /// Deadline for waiting on missing shards, fixed when the router is built.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}

#[async_trait]
impl ShardedTable for TableRouter {
    fn ident(&self) -> &TableIdent {
        self.table.ident()
    }

    fn shard_count(&self) -> u32 {
        self.table.shard_count()
    }

    async fn routing(
        &self,
        predicate: &RoutingPredicate,
        preference: Option<&Preference>,
    ) -> Result<RoutingTable> {
        let resolution = self.resolver.start_with_timeout(
            self.table.clone(),
            predicate.clone(),
            preference.cloned(),
            self.fetch_timeout,
        )?;
        match resolution {
            Resolution::Ready(routing) => Ok(routing),
            Resolution::Pending(pending) => pending.await,
        }
    }
}
