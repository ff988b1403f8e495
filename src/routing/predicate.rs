use crate::metadata::{DocTableInfo, PartitionFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The part of a query's filter that routing cares about: which partitions
/// it can match and which clustered-by values it pins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPredicate {
    /// Physical indices of the matching partitions; `None` means all.
    #[serde(default)]
    partitions: Option<Vec<String>>,
    #[serde(default)]
    routing_values: BTreeSet<String>,
}

impl RoutingPredicate {
    /// Matches every partition and shard.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Restricts the query to the given partition indices. An empty list
    /// matches nothing.
    pub fn for_partitions(partitions: impl IntoIterator<Item = String>) -> Self {
        Self {
            partitions: Some(partitions.into_iter().collect()),
            routing_values: BTreeSet::new(),
        }
    }

    /// Prunes `table`'s partitions with `filter`.
    pub fn from_filter(table: &DocTableInfo, filter: &PartitionFilter) -> Self {
        if !table.is_partitioned() || filter.is_empty() {
            return Self::match_all();
        }
        Self::for_partitions(table.matching_partition_indices(filter))
    }

    /// Pins the clustered-by column to the given values.
    pub fn with_routing_values(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.routing_values.extend(values);
        self
    }

    pub fn partitions(&self) -> Option<&[String]> {
        self.partitions.as_deref()
    }

    /// Clustered-by values, if the query pins any.
    pub fn routing_values(&self) -> Option<&BTreeSet<String>> {
        if self.routing_values.is_empty() {
            None
        } else {
            Some(&self.routing_values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnIdent, TableIdent};

    #[test]
    fn filter_on_unpartitioned_table_matches_all() {
        let table = DocTableInfo::new(TableIdent::in_default_schema("t").unwrap(), 2).unwrap();
        let filter = PartitionFilter::new().eq(ColumnIdent::new("d"), Some("x".to_string()));
        assert_eq!(RoutingPredicate::from_filter(&table, &filter), RoutingPredicate::match_all());
    }

    #[test]
    fn filter_matching_nothing_gives_empty_partition_list() {
        let table = DocTableInfo::new(TableIdent::in_default_schema("p").unwrap(), 2)
            .unwrap()
            .partitioned_by(vec![ColumnIdent::new("d")])
            .unwrap()
            .with_partition(vec![Some("2024-01".to_string())])
            .unwrap();
        let filter = PartitionFilter::new().eq(ColumnIdent::new("d"), Some("1999-01".to_string()));
        let predicate = RoutingPredicate::from_filter(&table, &filter);
        assert_eq!(predicate.partitions(), Some(&[][..]));
        assert!(predicate.routing_values().is_none());
    }
}
