use crate::cluster::{ClusterSnapshot, InMemoryClusterService, Preference};
use crate::config::RoutingFetchPolicy;
use crate::core::{Result, RoutingError};
use crate::metadata::DocTableInfo;
use crate::routing::{RoutingPredicate, RoutingResolver, RoutingTable};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// A cluster state published some time after the scenario starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledUpdate {
    /// Delay from the start of the scenario.
    pub after_ms: u64,
    pub cluster: ClusterSnapshot,
}

/// A self-contained routing run: table metadata, the initial cluster state,
/// the query and the states published while it waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingScenario {
    pub table: DocTableInfo,
    pub cluster: ClusterSnapshot,
    #[serde(default)]
    pub predicate: RoutingPredicate,
    #[serde(default)]
    pub preference: Option<Preference>,
    #[serde(default)]
    pub policy: RoutingFetchPolicy,
    #[serde(default)]
    pub updates: Vec<ScheduledUpdate>,
}

impl RoutingScenario {
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.shard_count() == 0 {
            return Err(RoutingError::Configuration(format!(
                "Table '{}' must have at least one shard",
                self.table
            )));
        }
        self.policy.validate()
    }

    /// Deadline the resolver grants this scenario's table.
    pub fn fetch_timeout(&self) -> Duration {
        self.policy.fetch_timeout(self.table.partition_count())
    }

    /// Resolves the routing while publishing the scheduled updates.
    pub async fn run(self) -> Result<RoutingTable> {
        let service = Arc::new(InMemoryClusterService::new(self.cluster));
        let resolver = RoutingResolver::new(service.clone(), self.policy)?;

        let mut updates = self.updates;
        updates.sort_by_key(|update| update.after_ms);
        let started = Instant::now();
        let publisher = tokio::spawn(async move {
            for update in updates {
                sleep_until(started + Duration::from_millis(update.after_ms)).await;
                match service.publish(update.cluster) {
                    Ok(state) => info!("scenario published cluster state version {}", state.version()),
                    Err(err) => {
                        warn!("scenario stopped publishing: {}", err);
                        break;
                    }
                }
            }
        });

        let result = resolver
            .resolve(Arc::new(self.table), self.predicate, self.preference)
            .await;
        publisher.abort();
        result
    }
}
