//! Routing modes and routing decisions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::energy::EnergyReading;
use crate::node::NodeInfo;

/// Node selection strategy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Lowest effective energy price.
    Cheapest,
    /// Lowest carbon intensity. The default, and carries the green
    /// surcharge.
    #[default]
    Greenest,
    /// Equal-weight blend of normalized price and carbon.
    Balanced,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Cheapest => "cheapest",
            RoutingMode::Greenest => "greenest",
            RoutingMode::Balanced => "balanced",
        }
    }

    /// Parse a mode name, returning `None` for anything unrecognized.
    /// Callers that take modes from request bodies fall back to the
    /// default instead of rejecting the request.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cheapest" => Some(RoutingMode::Cheapest),
            "greenest" => Some(RoutingMode::Greenest),
            "balanced" => Some(RoutingMode::Balanced),
            _ => None,
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutingMode::parse(s).ok_or_else(|| format!("unknown routing mode: {s}"))
    }
}

/// The outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// The node selected to execute the request.
    pub node: NodeInfo,
    pub mode: RoutingMode,
    /// Energy conditions at the selected node; synthesized from the
    /// node's static cost when no live data exists.
    pub energy: EnergyReading,
    /// Human-readable explanation of why this node won.
    pub reason: String,
}

impl RoutingDecision {
    /// Whether the selected node is the gateway itself.
    pub fn is_local(&self, self_node_id: &str) -> bool {
        self.node.id == self_node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_greenest() {
        assert_eq!(RoutingMode::default(), RoutingMode::Greenest);
    }

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(RoutingMode::parse("cheapest"), Some(RoutingMode::Cheapest));
        assert_eq!(RoutingMode::parse("balanced"), Some(RoutingMode::Balanced));
        assert_eq!(RoutingMode::parse("fastest"), None);
        assert_eq!(RoutingMode::parse("GREENEST"), None);
    }

    #[test]
    fn test_from_str_reports_unknown() {
        let err = "turbo".parse::<RoutingMode>().unwrap_err();
        assert!(err.contains("turbo"));
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoutingMode::Balanced).expect("serialize"),
            "\"balanced\""
        );
    }
}
