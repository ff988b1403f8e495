use crate::core::{NodeId, ShardId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where one active shard copy lives.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardLocation {
    pub node_id: NodeId,
    pub index: String,
    pub shard: u32,
}

impl ShardLocation {
    pub fn new(node_id: impl Into<NodeId>, index: impl Into<String>, shard: u32) -> Self {
        Self {
            node_id: node_id.into(),
            index: index.into(),
            shard,
        }
    }
}

/// Complete routing for a query: per node, per physical index, the shard
/// numbers to visit, all in ascending order.
///
/// Only built once every required shard had an active location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    locations: BTreeMap<NodeId, BTreeMap<String, Vec<u32>>>,
}

impl RoutingTable {
    /// Routing that visits no shard at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_locations(locations: BTreeMap<NodeId, BTreeMap<String, Vec<u32>>>) -> Self {
        Self { locations }
    }

    pub fn locations(&self) -> &BTreeMap<NodeId, BTreeMap<String, Vec<u32>>> {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.locations.len()
    }

    /// Physical indices touched on any node.
    pub fn indices(&self) -> BTreeSet<&str> {
        self.locations
            .values()
            .flat_map(|indices| indices.keys().map(String::as_str))
            .collect()
    }

    /// Total number of shards to visit.
    pub fn shard_count(&self) -> usize {
        self.locations
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Shards of `index` to visit on `node_id`.
    pub fn shards_on(&self, node_id: &str, index: &str) -> &[u32] {
        self.locations
            .get(node_id)
            .and_then(|indices| indices.get(index))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Node the given shard is routed to.
    pub fn node_for(&self, index: &str, shard: u32) -> Option<&str> {
        self.locations.iter().find_map(|(node, indices)| {
            indices
                .get(index)
                .filter(|shards| shards.contains(&shard))
                .map(|_| node.as_str())
        })
    }
}

/// Shards that had no active location in one attempt, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingShardSet {
    shards: BTreeSet<ShardId>,
}

impl MissingShardSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shard: ShardId) -> bool {
        self.shards.insert(shard)
    }

    pub fn contains(&self, shard: &ShardId) -> bool {
        self.shards.contains(shard)
    }

    pub fn first(&self) -> Option<&ShardId> {
        self.shards.first()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShardId> {
        self.shards.iter()
    }
}

/// Physical indices one resolution must search, without duplicates, in the
/// order they were first named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalIndexSet {
    indices: Vec<String>,
}

impl PhysicalIndexSet {
    pub fn new(indices: impl IntoIterator<Item = String>) -> Self {
        let mut seen = BTreeSet::new();
        let indices = indices
            .into_iter()
            .filter(|index| seen.insert(index.clone()))
            .collect();
        Self { indices }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
