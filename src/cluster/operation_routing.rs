use super::preference::Preference;
use super::shard_hash::shard_for_routing;
use super::state::{ClusterSnapshot, ShardRouting};
use crate::core::{Result, RoutingError, ShardId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Routing values to search, per physical index.
pub type RoutingHints = BTreeMap<String, BTreeSet<String>>;

/// Candidate copies of one shard, best candidate first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardIterator {
    shard_id: ShardId,
    candidates: VecDeque<ShardRouting>,
}

impl ShardIterator {
    pub fn new(shard_id: ShardId, candidates: Vec<ShardRouting>) -> Self {
        Self {
            shard_id,
            candidates: candidates.into(),
        }
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }
}

impl Iterator for ShardIterator {
    type Item = ShardRouting;

    fn next(&mut self) -> Option<Self::Item> {
        self.candidates.pop_front()
    }
}

/// Maps each requested index to the routing values to search it with.
///
/// Fails with `IndexNotFound` if any requested index is absent.
pub fn resolve_search_routing(
    state: &ClusterSnapshot,
    routing_values: &BTreeSet<String>,
    indices: &[String],
) -> Result<RoutingHints> {
    indices
        .iter()
        .map(|index| {
            if state.has_index(index) {
                Ok((index.clone(), routing_values.clone()))
            } else {
                Err(RoutingError::IndexNotFound(index.clone()))
            }
        })
        .collect()
}

/// Builds one shard iterator per shard to search.
///
/// Without routing hints every shard of every index is searched; with hints
/// only the shards the routing values hash to. Unassigned copies are never
/// candidates, so an iterator may be empty. Active copies always come before
/// initializing ones; `preference` orders or filters within that split.
pub fn search_shards(
    state: &ClusterSnapshot,
    indices: &[String],
    hints: Option<&RoutingHints>,
    preference: Option<&Preference>,
) -> Result<Vec<ShardIterator>> {
    let mut iterators = Vec::new();
    for index in indices {
        let table = state
            .index(index)
            .ok_or_else(|| RoutingError::IndexNotFound(index.clone()))?;

        let shards = match hints.and_then(|hints| hints.get(index)) {
            Some(values) if !values.is_empty() => values
                .iter()
                .map(|value| shard_for_routing(value, table.number_of_shards))
                .collect::<BTreeSet<_>>(),
            _ => (0..table.number_of_shards).collect(),
        };

        for shard in shards {
            let candidates = order_candidates(state, table.copies(shard), shard, preference);
            iterators.push(ShardIterator::new(
                ShardId::new(index.clone(), shard),
                candidates,
            ));
        }
    }
    Ok(iterators)
}

fn order_candidates(
    state: &ClusterSnapshot,
    copies: &[ShardRouting],
    shard: u32,
    preference: Option<&Preference>,
) -> Vec<ShardRouting> {
    let local = state.local_node_id();
    let on_node = |copy: &ShardRouting, node: Option<&str>| {
        node.is_some() && copy.node_id.as_deref() == node
    };

    let mut candidates = copies
        .iter()
        .filter(|copy| copy.assigned())
        .filter(|copy| match preference {
            Some(Preference::OnlyLocal) => on_node(*copy, local),
            Some(Preference::OnlyNode(node)) => on_node(*copy, Some(node.as_str())),
            Some(Preference::Primary) => copy.primary,
            Some(Preference::Replica) => !copy.primary,
            _ => true,
        })
        .cloned()
        .collect::<Vec<_>>();

    // Spread reads across copies; a custom preference pins its own rotation.
    let seed = match preference {
        Some(Preference::Custom(value)) => shard_for_routing(value, u32::MAX) as usize,
        _ => 0,
    }
    .wrapping_add(shard as usize);
    if !candidates.is_empty() {
        let len = candidates.len();
        candidates.rotate_left(seed % len);
    }

    candidates.sort_by_key(|copy| {
        let preferred = match preference {
            Some(Preference::Local) => on_node(copy, local),
            Some(Preference::PreferNode(node)) => on_node(copy, Some(node.as_str())),
            Some(Preference::PrimaryFirst) => copy.primary,
            _ => true,
        };
        (!copy.active(), !preferred)
    });
    candidates
}
