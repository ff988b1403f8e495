use crate::core::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default fetch timeout granted per partition of a table.
pub const DEFAULT_TIMEOUT_PER_PARTITION_MS: u64 = 5_000;

/// Default size of the classification worker pool.
pub const DEFAULT_MAX_CONCURRENT_ATTEMPTS: usize = 8;

/// Controls how long and how wide the resolver waits for shards to come online.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingFetchPolicy {
    /// Fetch timeout granted per partition; unpartitioned tables count as one.
    pub timeout_per_partition_ms: u64,
    /// Number of routing attempts allowed to classify cluster states at once,
    /// shared by every pending resolution of a resolver.
    pub max_concurrent_attempts: usize,
    /// Lower bound applied to every computed deadline.
    #[serde(default)]
    pub min_timeout_ms: u64,
}

impl Default for RoutingFetchPolicy {
    fn default() -> Self {
        Self {
            timeout_per_partition_ms: DEFAULT_TIMEOUT_PER_PARTITION_MS,
            max_concurrent_attempts: DEFAULT_MAX_CONCURRENT_ATTEMPTS,
            min_timeout_ms: 0,
        }
    }
}

impl RoutingFetchPolicy {
    /// Set the per-partition fetch timeout
    pub fn timeout_per_partition(mut self, timeout: Duration) -> Self {
        self.timeout_per_partition_ms = duration_to_ms(timeout);
        self
    }

    /// Set the worker pool size
    pub fn max_concurrent_attempts(mut self, max: usize) -> Self {
        self.max_concurrent_attempts = max;
        self
    }

    /// Set the minimum deadline
    pub fn min_timeout(mut self, timeout: Duration) -> Self {
        self.min_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Computes the fetch deadline for a table with `partition_count` partitions.
    ///
    /// Scales linearly with the partition count, counting an unpartitioned
    /// table (or one without partitions yet) as a single unit.
    pub fn fetch_timeout(&self, partition_count: usize) -> Duration {
        let units = partition_count.max(1) as u64;
        let timeout_ms = self
            .timeout_per_partition_ms
            .saturating_mul(units)
            .max(self.min_timeout_ms);
        Duration::from_millis(timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_per_partition_ms == 0 {
            return Err(RoutingError::Configuration(
                "timeout_per_partition_ms must be >= 1".to_string(),
            ));
        }
        if self.max_concurrent_attempts == 0 {
            return Err(RoutingError::Configuration(
                "max_concurrent_attempts must be >= 1".to_string(),
            ));
        }
        if self.max_concurrent_attempts > Semaphore::MAX_PERMITS {
            return Err(RoutingError::Configuration(format!(
                "max_concurrent_attempts must be <= {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_timeout_scales_with_partitions() {
        let policy = RoutingFetchPolicy::default();
        assert_eq!(policy.fetch_timeout(0), Duration::from_secs(5));
        assert_eq!(policy.fetch_timeout(1), Duration::from_secs(5));
        assert_eq!(policy.fetch_timeout(3), Duration::from_secs(15));
    }

    #[test]
    fn fetch_timeout_respects_minimum() {
        let policy = RoutingFetchPolicy::default()
            .timeout_per_partition(Duration::from_millis(10))
            .min_timeout(Duration::from_millis(100));
        assert_eq!(policy.fetch_timeout(2), Duration::from_millis(100));
        assert_eq!(policy.fetch_timeout(20), Duration::from_millis(200));
    }

    #[test]
    fn validate_rejects_empty_pool() {
        let policy = RoutingFetchPolicy::default().max_concurrent_attempts(0);
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_attempts"));
    }

    #[test]
    fn validate_rejects_pool_above_semaphore_limit() {
        let policy: RoutingFetchPolicy = serde_json::from_str(&format!(
            r#"{{"timeout_per_partition_ms": 250, "max_concurrent_attempts": {}}}"#,
            usize::MAX
        ))
        .unwrap();
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
        assert!(err.to_string().contains("max_concurrent_attempts"));

        let largest = RoutingFetchPolicy::default().max_concurrent_attempts(Semaphore::MAX_PERMITS);
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn policy_reads_from_json_without_optional_fields() {
        let policy: RoutingFetchPolicy = serde_json::from_str(
            r#"{"timeout_per_partition_ms": 250, "max_concurrent_attempts": 2}"#,
        )
        .unwrap();
        assert_eq!(policy.min_timeout_ms, 0);
        assert_eq!(policy.fetch_timeout(4), Duration::from_secs(1));
    }
}
