use super::ident::{ColumnIdent, DEFAULT_SCHEMA, TableIdent};
use crate::core::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Marker segment shared by every partition index name.
pub const PARTITIONED_TABLE_PREFIX: &str = ".partitioned";

const NULL_VALUE_TOKEN: &str = "_";

/// Ordered partitioning columns of a table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    columns: Vec<ColumnIdent>,
}

impl PartitionDescriptor {
    pub fn new(columns: Vec<ColumnIdent>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnIdent] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `column` in the declaration order.
    pub fn position(&self, column: &ColumnIdent) -> Option<usize> {
        self.columns.iter().position(|candidate| candidate == column)
    }
}

/// One partition of a partitioned table: the table plus one value per
/// partitioning column, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionName {
    table: TableIdent,
    values: Vec<Option<String>>,
}

impl PartitionName {
    pub fn new(table: TableIdent, values: Vec<Option<String>>) -> Self {
        Self { table, values }
    }

    pub fn table(&self) -> &TableIdent {
        &self.table
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Encoded partition values; never contains `.`.
    pub fn ident(&self) -> String {
        self.values
            .iter()
            .map(|value| match value {
                Some(value) => encode_value(value),
                None => NULL_VALUE_TOKEN.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Physical index name, `[<schema>.].partitioned.<table>.<ident>`.
    pub fn index_name(&self) -> String {
        let schema_prefix = if self.table.schema() == DEFAULT_SCHEMA {
            String::new()
        } else {
            format!("{}.", self.table.schema())
        };
        format!(
            "{}{}.{}.{}",
            schema_prefix,
            PARTITIONED_TABLE_PREFIX,
            self.table.name(),
            self.ident()
        )
    }

    /// True if `index_name` names a partition index.
    pub fn is_partition(index_name: &str) -> bool {
        index_name.starts_with(PARTITIONED_TABLE_PREFIX)
            || index_name.contains(&format!(".{}.", PARTITIONED_TABLE_PREFIX))
    }

    /// Decodes a physical partition index name.
    pub fn from_index_name(index_name: &str) -> Result<Self> {
        let invalid = || {
            RoutingError::InvalidIdentifier(format!(
                "'{}' is not a partition index name",
                index_name
            ))
        };

        let marker = format!("{}.", PARTITIONED_TABLE_PREFIX);
        let (schema, rest) = if let Some(rest) = index_name.strip_prefix(&marker) {
            (DEFAULT_SCHEMA, rest)
        } else {
            index_name
                .split_once(&format!(".{}", marker))
                .ok_or_else(invalid)?
        };

        let (table_name, ident) = rest.split_once('.').ok_or_else(invalid)?;
        let values = ident
            .split(',')
            .map(|token| {
                if token == NULL_VALUE_TOKEN {
                    Ok(None)
                } else {
                    decode_value(token).map(Some).ok_or_else(invalid)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            table: TableIdent::new(schema, table_name)?,
            values,
        })
    }
}

fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
    out
}

fn decode_value(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = token.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Partition pruning constraints: per partitioning column, the set of values
/// a partition may hold. Columns without a constraint match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionFilter {
    allowed: BTreeMap<ColumnIdent, BTreeSet<Option<String>>>,
}

impl PartitionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts `column` to a single value.
    pub fn eq(self, column: ColumnIdent, value: Option<String>) -> Self {
        self.any_of(column, [value])
    }

    /// Restricts `column` to any of `values`; repeated calls intersect.
    pub fn any_of(
        mut self,
        column: ColumnIdent,
        values: impl IntoIterator<Item = Option<String>>,
    ) -> Self {
        let values = values.into_iter().collect::<BTreeSet<_>>();
        match self.allowed.get_mut(&column) {
            Some(existing) => existing.retain(|value| values.contains(value)),
            None => {
                self.allowed.insert(column, values);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// True if `partition` satisfies every constraint on a partitioning column.
    pub fn matches(&self, descriptor: &PartitionDescriptor, partition: &PartitionName) -> bool {
        self.allowed.iter().all(|(column, allowed)| {
            match descriptor.position(column) {
                Some(position) => partition
                    .values()
                    .get(position)
                    .is_some_and(|value| allowed.contains(value)),
                // Constraints on regular columns cannot prune partitions.
                None => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parted() -> TableIdent {
        TableIdent::in_default_schema("parted").unwrap()
    }

    #[test]
    fn partition_index_name_is_reversible() {
        let partition = PartitionName::new(
            TableIdent::new("sales", "orders").unwrap(),
            vec![Some("2024-01".to_string()), None, Some("a.b,c_%".to_string())],
        );
        let index_name = partition.index_name();
        assert!(index_name.starts_with("sales..partitioned.orders."));
        assert!(PartitionName::is_partition(&index_name));
        assert_eq!(PartitionName::from_index_name(&index_name).unwrap(), partition);
    }

    #[test]
    fn default_schema_partitions_have_no_prefix() {
        let partition = PartitionName::new(parted(), vec![Some("2024-01".to_string())]);
        assert_eq!(partition.index_name(), ".partitioned.parted.2024-01");
        assert!(!PartitionName::is_partition("parted"));
    }

    #[test]
    fn from_index_name_rejects_plain_indices() {
        assert!(PartitionName::from_index_name("parted").is_err());
    }

    #[test]
    fn filter_prunes_on_partition_columns_only() {
        let descriptor = PartitionDescriptor::new(vec![ColumnIdent::new("d")]);
        let january = PartitionName::new(parted(), vec![Some("2024-01".to_string())]);
        let february = PartitionName::new(parted(), vec![Some("2024-02".to_string())]);

        let filter = PartitionFilter::new()
            .eq(ColumnIdent::new("d"), Some("2024-02".to_string()))
            .eq(ColumnIdent::new("name"), Some("ignored".to_string()));
        assert!(!filter.matches(&descriptor, &january));
        assert!(filter.matches(&descriptor, &february));
    }

    #[test]
    fn repeated_constraints_intersect() {
        let descriptor = PartitionDescriptor::new(vec![ColumnIdent::new("d")]);
        let january = PartitionName::new(parted(), vec![Some("2024-01".to_string())]);
        let filter = PartitionFilter::new()
            .any_of(
                ColumnIdent::new("d"),
                [Some("2024-01".to_string()), Some("2024-02".to_string())],
            )
            .eq(ColumnIdent::new("d"), Some("2024-02".to_string()));
        assert!(!filter.matches(&descriptor, &january));
    }
}
