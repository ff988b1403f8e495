use crate::core::{NodeId, Result, RoutingError, ShardId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Allocation state of one shard copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardRoutingState {
    /// Not allocated to any node.
    Unassigned,
    /// Allocated and recovering; not yet searchable.
    Initializing,
    /// Allocated and searchable.
    Started,
    /// Searchable on its current node while moving to another one.
    Relocating,
}

/// Placement of one copy (primary or replica) of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRouting {
    pub index: String,
    pub shard: u32,
    #[serde(default)]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub relocating_node_id: Option<NodeId>,
    pub primary: bool,
    pub state: ShardRoutingState,
}

impl ShardRouting {
    /// Creates an unassigned copy.
    pub fn unassigned(index: impl Into<String>, shard: u32, primary: bool) -> Self {
        Self {
            index: index.into(),
            shard,
            node_id: None,
            relocating_node_id: None,
            primary,
            state: ShardRoutingState::Unassigned,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        ShardId::new(self.index.clone(), self.shard)
    }

    /// True if the copy can serve reads.
    pub fn active(&self) -> bool {
        matches!(
            self.state,
            ShardRoutingState::Started | ShardRoutingState::Relocating
        )
    }

    pub fn assigned(&self) -> bool {
        self.node_id.is_some() && self.state != ShardRoutingState::Unassigned
    }

    fn assign(&mut self, node_id: NodeId, state: ShardRoutingState) {
        self.node_id = Some(node_id);
        self.relocating_node_id = None;
        self.state = state;
    }

    fn unassign(&mut self) {
        self.node_id = None;
        self.relocating_node_id = None;
        self.state = ShardRoutingState::Unassigned;
    }
}

/// All copies of all shards of one physical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRoutingTable {
    pub index: String,
    pub number_of_shards: u32,
    /// Copies per shard number, primary first.
    pub shards: BTreeMap<u32, Vec<ShardRouting>>,
}

impl IndexRoutingTable {
    pub fn new(index: impl Into<String>, number_of_shards: u32, number_of_replicas: u32) -> Self {
        let index = index.into();
        let shards = (0..number_of_shards)
            .map(|shard| {
                let mut copies = vec![ShardRouting::unassigned(index.clone(), shard, true)];
                copies.extend(
                    (0..number_of_replicas)
                        .map(|_| ShardRouting::unassigned(index.clone(), shard, false)),
                );
                (shard, copies)
            })
            .collect();
        Self {
            index,
            number_of_shards,
            shards,
        }
    }

    pub fn copies(&self, shard: u32) -> &[ShardRouting] {
        self.shards.get(&shard).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Immutable view of cluster membership and shard placement at one version.
///
/// Snapshots are published by a [`ClusterMembershipService`](super::ClusterMembershipService);
/// the mutating methods are meant for building the next version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    version: u64,
    #[serde(default = "Uuid::new_v4")]
    state_uuid: Uuid,
    #[serde(default = "Utc::now")]
    published_at: DateTime<Utc>,
    #[serde(default)]
    local_node_id: Option<NodeId>,
    #[serde(default)]
    nodes: BTreeSet<NodeId>,
    #[serde(default)]
    indices: BTreeMap<String, IndexRoutingTable>,
}

impl Default for ClusterSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self {
            version: 0,
            state_uuid: Uuid::new_v4(),
            published_at: Utc::now(),
            local_node_id: None,
            nodes: BTreeSet::new(),
            indices: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state_uuid(&self) -> Uuid {
        self.state_uuid
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn local_node_id(&self) -> Option<&str> {
        self.local_node_id.as_deref()
    }

    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn index(&self, index: &str) -> Option<&IndexRoutingTable> {
        self.indices.get(index)
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    /// Stamps the snapshot as the given published version.
    pub(crate) fn stamp(&mut self, version: u64) {
        self.version = version;
        self.state_uuid = Uuid::new_v4();
        self.published_at = Utc::now();
    }

    pub fn add_node(&mut self, node_id: impl Into<NodeId>) -> Result<()> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(RoutingError::ExecutionError(
                "node_id must not be empty".to_string(),
            ));
        }
        self.nodes.insert(node_id);
        Ok(())
    }

    /// Removes a node; every shard copy it held becomes unassigned.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        if !self.nodes.remove(node_id) {
            return false;
        }
        for table in self.indices.values_mut() {
            for copy in table.shards.values_mut().flatten() {
                if copy.node_id.as_deref() == Some(node_id) {
                    copy.unassign();
                } else if copy.relocating_node_id.as_deref() == Some(node_id) {
                    copy.relocating_node_id = None;
                    copy.state = ShardRoutingState::Started;
                }
            }
        }
        if self.local_node_id.as_deref() == Some(node_id) {
            self.local_node_id = None;
        }
        true
    }

    pub fn set_local_node(&mut self, node_id: impl Into<NodeId>) -> Result<()> {
        let node_id = node_id.into();
        self.ensure_member(&node_id)?;
        self.local_node_id = Some(node_id);
        Ok(())
    }

    /// Creates an index whose copies are all unassigned.
    pub fn create_index(
        &mut self,
        index: impl Into<String>,
        number_of_shards: u32,
        number_of_replicas: u32,
    ) -> Result<()> {
        let index = index.into();
        if number_of_shards == 0 {
            return Err(RoutingError::ExecutionError(format!(
                "Index '{}' must have at least one shard",
                index
            )));
        }
        if self.indices.contains_key(&index) {
            return Err(RoutingError::ExecutionError(format!(
                "Index '{}' already exists",
                index
            )));
        }
        self.indices.insert(
            index.clone(),
            IndexRoutingTable::new(index, number_of_shards, number_of_replicas),
        );
        Ok(())
    }

    pub fn delete_index(&mut self, index: &str) -> bool {
        self.indices.remove(index).is_some()
    }

    /// Allocates the primary to `node_id` in the initializing state.
    pub fn initialize_shard(&mut self, index: &str, shard: u32, node_id: &str) -> Result<()> {
        self.ensure_member(node_id)?;
        self.primary_mut(index, shard)?
            .assign(node_id.to_string(), ShardRoutingState::Initializing);
        Ok(())
    }

    /// Allocates the primary to `node_id` in the started state.
    pub fn start_shard(&mut self, index: &str, shard: u32, node_id: &str) -> Result<()> {
        self.ensure_member(node_id)?;
        self.primary_mut(index, shard)?
            .assign(node_id.to_string(), ShardRoutingState::Started);
        Ok(())
    }

    /// Starts moving an active primary to `target_node`.
    pub fn relocate_shard(&mut self, index: &str, shard: u32, target_node: &str) -> Result<()> {
        self.ensure_member(target_node)?;
        let primary = self.primary_mut(index, shard)?;
        if !primary.active() {
            return Err(RoutingError::ExecutionError(format!(
                "Shard {} cannot relocate while in state {:?}",
                primary.shard_id(),
                primary.state
            )));
        }
        primary.state = ShardRoutingState::Relocating;
        primary.relocating_node_id = Some(target_node.to_string());
        Ok(())
    }

    pub fn unassign_shard(&mut self, index: &str, shard: u32) -> Result<()> {
        self.primary_mut(index, shard)?.unassign();
        Ok(())
    }

    /// Starts a replica of the shard on `node_id`, using the first replica slot
    /// that is free or already on that node.
    pub fn start_replica(&mut self, index: &str, shard: u32, node_id: &str) -> Result<()> {
        self.ensure_member(node_id)?;
        let copies = self.copies_mut(index, shard)?;
        if copies
            .iter()
            .any(|copy| copy.primary && copy.node_id.as_deref() == Some(node_id))
        {
            return Err(RoutingError::ExecutionError(format!(
                "Replica of [{}][{}] cannot share node '{}' with its primary",
                index, shard, node_id
            )));
        }
        let slot = copies
            .iter_mut()
            .filter(|copy| !copy.primary)
            .find(|copy| copy.node_id.as_deref() == Some(node_id) || !copy.assigned())
            .ok_or_else(|| {
                RoutingError::ExecutionError(format!(
                    "No free replica slot for [{}][{}]",
                    index, shard
                ))
            })?;
        slot.assign(node_id.to_string(), ShardRoutingState::Started);
        Ok(())
    }

    fn ensure_member(&self, node_id: &str) -> Result<()> {
        if self.nodes.contains(node_id) {
            Ok(())
        } else {
            Err(RoutingError::ExecutionError(format!(
                "Node '{}' is not part of cluster membership",
                node_id
            )))
        }
    }

    fn copies_mut(&mut self, index: &str, shard: u32) -> Result<&mut Vec<ShardRouting>> {
        self.indices
            .get_mut(index)
            .ok_or_else(|| RoutingError::IndexNotFound(index.to_string()))?
            .shards
            .get_mut(&shard)
            .ok_or_else(|| {
                RoutingError::ExecutionError(format!(
                    "Shard {} is out of range for index '{}'",
                    shard, index
                ))
            })
    }

    fn primary_mut(&mut self, index: &str, shard: u32) -> Result<&mut ShardRouting> {
        self.copies_mut(index, shard)?
            .iter_mut()
            .find(|copy| copy.primary)
            .ok_or_else(|| {
                RoutingError::ExecutionError(format!("Shard [{}][{}] has no primary", index, shard))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_state() -> ClusterSnapshot {
        let mut state = ClusterSnapshot::new();
        state.add_node("n1").unwrap();
        state.add_node("n2").unwrap();
        state.create_index("t", 2, 1).unwrap();
        state
    }

    #[test]
    fn new_index_copies_are_unassigned() {
        let state = two_node_state();
        let table = state.index("t").unwrap();
        assert_eq!(table.number_of_shards, 2);
        assert_eq!(table.copies(0).len(), 2);
        assert!(table.copies(1).iter().all(|copy| !copy.assigned()));
        assert!(table.copies(5).is_empty());
    }

    #[test]
    fn shard_lifecycle_tracks_activity() {
        let mut state = two_node_state();
        state.initialize_shard("t", 0, "n1").unwrap();
        assert!(!state.index("t").unwrap().copies(0)[0].active());

        state.start_shard("t", 0, "n1").unwrap();
        assert!(state.index("t").unwrap().copies(0)[0].active());

        state.relocate_shard("t", 0, "n2").unwrap();
        let primary = &state.index("t").unwrap().copies(0)[0];
        assert!(primary.active());
        assert_eq!(primary.relocating_node_id.as_deref(), Some("n2"));
    }

    #[test]
    fn removing_node_unassigns_its_copies() {
        let mut state = two_node_state();
        state.start_shard("t", 0, "n1").unwrap();
        state.start_replica("t", 0, "n2").unwrap();
        assert!(state.remove_node("n1"));

        let copies = state.index("t").unwrap().copies(0);
        assert!(!copies[0].assigned());
        assert!(copies[1].active());
    }

    #[test]
    fn allocation_requires_membership() {
        let mut state = two_node_state();
        let err = state.start_shard("t", 0, "n9").unwrap_err();
        assert!(err.to_string().contains("not part of cluster membership"));
        assert!(matches!(
            state.start_shard("missing", 0, "n1"),
            Err(RoutingError::IndexNotFound(_))
        ));
    }

    #[test]
    fn replica_cannot_share_node_with_primary() {
        let mut state = two_node_state();
        state.start_shard("t", 1, "n1").unwrap();
        assert!(state.start_replica("t", 1, "n1").is_err());
        state.start_replica("t", 1, "n2").unwrap();
    }
}
