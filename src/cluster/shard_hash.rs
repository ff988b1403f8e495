/// Computes the shard a routing value maps to, using FNV-1a.
///
/// Stable across processes and releases for a fixed shard count.
pub fn shard_for_routing(routing_value: &str, shard_count: u32) -> u32 {
    if shard_count == 0 {
        return 0;
    }
    let mut hash = 14695981039346656037u64;
    for byte in routing_value.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash % shard_count as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_hash_is_stable_and_in_range() {
        for shard_count in [1, 2, 5, 64] {
            for value in ["", "1", "user-42", "2024-01"] {
                let shard = shard_for_routing(value, shard_count);
                assert!(shard < shard_count);
                assert_eq!(shard, shard_for_routing(value, shard_count));
            }
        }
        assert_eq!(shard_for_routing("anything", 0), 0);
    }

    #[test]
    fn routing_hash_spreads_values() {
        let shards = (0..100)
            .map(|i| shard_for_routing(&i.to_string(), 4))
            .collect::<std::collections::BTreeSet<_>>();
        assert_eq!(shards.len(), 4);
    }
}
