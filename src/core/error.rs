use super::types::ShardId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Shard {0} is not available")]
    ShardsUnavailable(ShardId),

    #[error("Fetching routing for table '{table}' timed out after {timeout_ms}ms")]
    RoutingTimeout { table: String, timeout_ms: u64 },

    #[error("Cluster service closed while fetching routing for table '{0}'")]
    RoutingUnavailable(String),

    #[error("Routing resolution for table '{0}' was cancelled")]
    Cancelled(String),

    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid preference: {0}")]
    InvalidPreference(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

impl<T> From<std::sync::PoisonError<T>> for RoutingError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for RoutingError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for RoutingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
