use crate::core::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which copy of a shard a search should prefer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Preference {
    /// Copies on the local node first.
    Local,
    /// Only copies on the local node.
    OnlyLocal,
    /// Only primaries.
    Primary,
    /// Primaries first.
    PrimaryFirst,
    /// Only replicas.
    Replica,
    /// Only copies on the given node.
    OnlyNode(String),
    /// Copies on the given node first.
    PreferNode(String),
    /// Any other string; the same string always yields the same copy order.
    Custom(String),
}

impl FromStr for Preference {
    type Err = RoutingError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RoutingError::InvalidPreference(
                "preference must not be empty".to_string(),
            ));
        }
        if !value.starts_with('_') {
            return Ok(Self::Custom(value.to_string()));
        }

        let (kind, argument) = match value.split_once(':') {
            Some((kind, argument)) => (kind, Some(argument)),
            None => (value, None),
        };
        let node_argument = || {
            argument
                .filter(|node| !node.trim().is_empty())
                .map(|node| node.trim().to_string())
                .ok_or_else(|| {
                    RoutingError::InvalidPreference(format!("'{}' requires a node id", kind))
                })
        };

        match kind {
            "_local" => Ok(Self::Local),
            "_only_local" => Ok(Self::OnlyLocal),
            "_primary" => Ok(Self::Primary),
            "_primary_first" => Ok(Self::PrimaryFirst),
            "_replica" => Ok(Self::Replica),
            "_only_node" => Ok(Self::OnlyNode(node_argument()?)),
            "_prefer_node" => Ok(Self::PreferNode(node_argument()?)),
            other => Err(RoutingError::InvalidPreference(format!(
                "unknown preference '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Preference {
    type Error = RoutingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Preference> for String {
    fn from(preference: Preference) -> Self {
        preference.to_string()
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("_local"),
            Self::OnlyLocal => f.write_str("_only_local"),
            Self::Primary => f.write_str("_primary"),
            Self::PrimaryFirst => f.write_str("_primary_first"),
            Self::Replica => f.write_str("_replica"),
            Self::OnlyNode(node) => write!(f, "_only_node:{}", node),
            Self::PreferNode(node) => write!(f, "_prefer_node:{}", node),
            Self::Custom(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_preferences() {
        assert_eq!("_local".parse::<Preference>().unwrap(), Preference::Local);
        assert_eq!(
            "_only_node:n2".parse::<Preference>().unwrap(),
            Preference::OnlyNode("n2".to_string())
        );
        assert_eq!(
            "session-17".parse::<Preference>().unwrap(),
            Preference::Custom("session-17".to_string())
        );
    }

    #[test]
    fn rejects_malformed_preferences() {
        for value in ["", "_only_node", "_prefer_node: ", "_nearest"] {
            assert!(
                matches!(
                    value.parse::<Preference>(),
                    Err(RoutingError::InvalidPreference(_))
                ),
                "expected {:?} to be rejected",
                value
            );
        }
    }

    #[test]
    fn display_round_trips_through_json() {
        let preference = Preference::PreferNode("n1".to_string());
        let json = serde_json::to_string(&preference).unwrap();
        assert_eq!(json, "\"_prefer_node:n1\"");
        assert_eq!(serde_json::from_str::<Preference>(&json).unwrap(), preference);
    }
}
