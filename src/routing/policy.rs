/// Decides whether a shard without any location candidate may be waited for.
///
/// A new partition can exist in table metadata before its shards are
/// allocated, so partitioned tables wait. Every shard of an unpartitioned
/// table exists as soon as the table does, so a missing one is fatal.
pub struct PartitionAwarenessPolicy;

impl PartitionAwarenessPolicy {
    pub fn tolerate_missing_shard(is_partitioned: bool) -> bool {
        is_partitioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_partitioned_tables_tolerate_missing_shards() {
        assert!(PartitionAwarenessPolicy::tolerate_missing_shard(true));
        assert!(!PartitionAwarenessPolicy::tolerate_missing_shard(false));
    }
}
