use super::table::{RoutingTable, ShardLocation};
use std::collections::BTreeMap;

/// Groups shard locations into `node -> index -> shards`.
///
/// The result does not depend on the order of the input: nodes and indices
/// are sorted by name, shard numbers ascending and without duplicates.
pub struct ShardLocationGrouper;

impl ShardLocationGrouper {
    pub fn group(locations: impl IntoIterator<Item = ShardLocation>) -> RoutingTable {
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<u32>>> = BTreeMap::new();
        for location in locations {
            grouped
                .entry(location.node_id)
                .or_default()
                .entry(location.index)
                .or_default()
                .push(location.shard);
        }
        for shards in grouped.values_mut().flat_map(BTreeMap::values_mut) {
            shards.sort_unstable();
            shards.dedup();
        }
        RoutingTable::from_locations(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ShardLocation> {
        vec![
            ShardLocation::new("n2", "t", 1),
            ShardLocation::new("n1", "t", 3),
            ShardLocation::new("n1", "t", 0),
            ShardLocation::new("n1", ".partitioned.p.2024-01", 2),
            ShardLocation::new("n2", ".partitioned.p.2024-01", 0),
        ]
    }

    #[test]
    fn grouping_is_independent_of_input_order() {
        let expected = ShardLocationGrouper::group(records());
        let mut reversed = records();
        reversed.reverse();
        assert_eq!(ShardLocationGrouper::group(reversed), expected);

        let mut rotated = records();
        rotated.rotate_left(2);
        assert_eq!(ShardLocationGrouper::group(rotated), expected);
    }

    #[test]
    fn grouping_sorts_nodes_indices_and_shards() {
        let table = ShardLocationGrouper::group(records());
        assert_eq!(table.nodes().collect::<Vec<_>>(), vec!["n1", "n2"]);
        assert_eq!(table.shards_on("n1", "t"), &[0, 3]);
        assert_eq!(
            table.locations()["n1"].keys().collect::<Vec<_>>(),
            vec![".partitioned.p.2024-01", "t"]
        );
        assert_eq!(table.shard_count(), 5);
        assert_eq!(table.node_for("t", 1), Some("n2"));
    }

    #[test]
    fn duplicate_records_collapse() {
        let table = ShardLocationGrouper::group(vec![
            ShardLocation::new("n1", "t", 0),
            ShardLocation::new("n1", "t", 0),
        ]);
        assert_eq!(table.shard_count(), 1);
    }

    #[test]
    fn no_records_give_empty_routing() {
        let table = ShardLocationGrouper::group(Vec::new());
        assert!(table.is_empty());
        assert_eq!(table, RoutingTable::empty());
    }
}
