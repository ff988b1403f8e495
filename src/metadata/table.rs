use super::ident::{ColumnIdent, TableIdent};
use super::partition::{PartitionDescriptor, PartitionFilter, PartitionName};
use crate::core::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata of a sharded document table.
///
/// A table is either backed by one physical index or, when it declares
/// partitioning columns, by one physical index per partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocTableInfo {
    ident: TableIdent,
    number_of_shards: u32,
    #[serde(default = "default_replicas")]
    number_of_replicas: String,
    #[serde(default)]
    partitioned_by: PartitionDescriptor,
    #[serde(default)]
    partitions: Vec<PartitionName>,
    #[serde(default)]
    clustered_by: Option<ColumnIdent>,
    #[serde(default)]
    primary_key: Vec<ColumnIdent>,
    #[serde(default)]
    is_alias: bool,
}

fn default_replicas() -> String {
    "1".to_string()
}

impl DocTableInfo {
    /// Creates an unpartitioned table.
    pub fn new(ident: TableIdent, number_of_shards: u32) -> Result<Self> {
        if number_of_shards == 0 {
            return Err(RoutingError::Configuration(format!(
                "Table '{}' must have at least one shard",
                ident
            )));
        }
        Ok(Self {
            ident,
            number_of_shards,
            number_of_replicas: default_replicas(),
            partitioned_by: PartitionDescriptor::default(),
            partitions: Vec::new(),
            clustered_by: None,
            primary_key: Vec::new(),
            is_alias: false,
        })
    }

    /// Declares the partitioning columns, turning the table into a partitioned one.
    pub fn partitioned_by(mut self, columns: Vec<ColumnIdent>) -> Result<Self> {
        if !self.partitions.is_empty() {
            return Err(RoutingError::Configuration(format!(
                "Cannot change partitioning of table '{}' with existing partitions",
                self.ident
            )));
        }
        self.partitioned_by = PartitionDescriptor::new(columns);
        Ok(self)
    }

    /// Registers an existing partition, given one value per partitioning column.
    pub fn with_partition(mut self, values: Vec<Option<String>>) -> Result<Self> {
        self.add_partition(values)?;
        Ok(self)
    }

    /// Registers an existing partition in place.
    pub fn add_partition(&mut self, values: Vec<Option<String>>) -> Result<PartitionName> {
        if !self.is_partitioned() {
            return Err(RoutingError::Configuration(format!(
                "Table '{}' is not partitioned",
                self.ident
            )));
        }
        if values.len() != self.partitioned_by.len() {
            return Err(RoutingError::Configuration(format!(
                "Partition of table '{}' needs {} values, got {}",
                self.ident,
                self.partitioned_by.len(),
                values.len()
            )));
        }
        let partition = PartitionName::new(self.ident.clone(), values);
        if !self.partitions.contains(&partition) {
            self.partitions.push(partition.clone());
        }
        Ok(partition)
    }

    pub fn clustered_by(mut self, column: ColumnIdent) -> Self {
        self.clustered_by = Some(column);
        self
    }

    pub fn primary_key(mut self, columns: Vec<ColumnIdent>) -> Self {
        self.primary_key = columns;
        self
    }

    pub fn number_of_replicas(mut self, replicas: impl Into<String>) -> Self {
        self.number_of_replicas = replicas.into();
        self
    }

    /// Marks the table as referenced through an alias.
    pub fn alias(mut self, is_alias: bool) -> Self {
        self.is_alias = is_alias;
        self
    }

    pub fn ident(&self) -> &TableIdent {
        &self.ident
    }

    pub fn shard_count(&self) -> u32 {
        self.number_of_shards
    }

    pub fn replicas(&self) -> &str {
        &self.number_of_replicas
    }

    pub fn clustered_by_column(&self) -> Option<&ColumnIdent> {
        self.clustered_by.as_ref()
    }

    pub fn primary_key_columns(&self) -> &[ColumnIdent] {
        &self.primary_key
    }

    pub fn is_alias(&self) -> bool {
        self.is_alias
    }

    /// Partitioning columns, guaranteed to be in declaration order.
    pub fn partition_descriptor(&self) -> &PartitionDescriptor {
        &self.partitioned_by
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitioned_by.is_empty()
    }

    pub fn partitions(&self) -> &[PartitionName] {
        &self.partitions
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// All physical indices backing the table.
    ///
    /// Empty for a partitioned table without partitions.
    pub fn concrete_indices(&self) -> Vec<String> {
        if self.is_partitioned() {
            self.partitions.iter().map(PartitionName::index_name).collect()
        } else {
            vec![self.ident.index_name()]
        }
    }

    /// Physical indices of the partitions matching `filter`.
    ///
    /// For an unpartitioned table this is the table's only index.
    pub fn matching_partition_indices(&self, filter: &PartitionFilter) -> Vec<String> {
        if !self.is_partitioned() {
            return self.concrete_indices();
        }
        self.partitions
            .iter()
            .filter(|partition| filter.matches(&self.partitioned_by, partition))
            .map(PartitionName::index_name)
            .collect()
    }
}

impl fmt::Display for DocTableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident.fqn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parted() -> DocTableInfo {
        DocTableInfo::new(TableIdent::in_default_schema("parted").unwrap(), 2)
            .unwrap()
            .partitioned_by(vec![ColumnIdent::new("d")])
            .unwrap()
            .with_partition(vec![Some("2024-01".to_string())])
            .unwrap()
            .with_partition(vec![Some("2024-02".to_string())])
            .unwrap()
            .with_partition(vec![Some("2024-03".to_string())])
            .unwrap()
    }

    #[test]
    fn unpartitioned_table_has_single_concrete_index() {
        let table = DocTableInfo::new(TableIdent::new("sales", "orders").unwrap(), 4).unwrap();
        assert!(!table.is_partitioned());
        assert_eq!(table.concrete_indices(), vec!["sales.orders".to_string()]);
        assert_eq!(
            table.matching_partition_indices(&PartitionFilter::new()),
            vec!["sales.orders".to_string()]
        );
        assert_eq!(table.to_string(), "sales.orders");
    }

    #[test]
    fn partitioned_table_lists_partition_indices() {
        let table = parted();
        assert!(table.is_partitioned());
        assert_eq!(table.partition_count(), 3);
        assert_eq!(
            table.concrete_indices(),
            vec![
                ".partitioned.parted.2024-01".to_string(),
                ".partitioned.parted.2024-02".to_string(),
                ".partitioned.parted.2024-03".to_string(),
            ]
        );
    }

    #[test]
    fn matching_partitions_follow_filter() {
        let table = parted();
        let filter = PartitionFilter::new().any_of(
            ColumnIdent::new("d"),
            [Some("2024-01".to_string()), Some("2024-03".to_string())],
        );
        assert_eq!(
            table.matching_partition_indices(&filter),
            vec![
                ".partitioned.parted.2024-01".to_string(),
                ".partitioned.parted.2024-03".to_string(),
            ]
        );

        let nothing = PartitionFilter::new().eq(ColumnIdent::new("d"), None);
        assert!(table.matching_partition_indices(&nothing).is_empty());
    }

    #[test]
    fn partitions_need_one_value_per_column() {
        let err = parted()
            .with_partition(vec![Some("a".to_string()), Some("b".to_string())])
            .unwrap_err();
        assert!(err.to_string().contains("needs 1 values"), "unexpected error: {}", err);
    }

    #[test]
    fn zero_shards_are_rejected() {
        assert!(DocTableInfo::new(TableIdent::in_default_schema("t").unwrap(), 0).is_err());
    }
}
