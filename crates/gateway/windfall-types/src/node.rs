//! Static node descriptors and probe health snapshots.

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Static description of one compute node in the fleet, loaded from
/// configuration at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: NodeId,
    /// Human-readable location name (e.g. `"Helsinki, Finland"`).
    pub name: String,
    pub ip: String,
    /// Electricity Maps zone code the node draws power from.
    pub grid_zone: String,
    pub lat: f64,
    pub lon: f64,
    /// Static energy cost used when no live market data exists.
    pub energy_cost_per_kwh: f64,
}

impl NodeInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        ip: impl Into<String>,
        grid_zone: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ip: ip.into(),
            grid_zone: grid_zone.into(),
            lat: 0.0,
            lon: 0.0,
            energy_cost_per_kwh: 0.06,
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    pub fn with_energy_cost(mut self, usd_per_kwh: f64) -> Self {
        self.energy_cost_per_kwh = usd_per_kwh;
        self
    }
}

/// Result of the most recent liveness probe against a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub healthy: bool,
    /// Round-trip time of the probe; `None` when the probe failed.
    pub latency_ms: Option<u64>,
    /// When the probe ran, Unix milliseconds.
    pub checked_at_ms: u64,
}

impl NodeHealth {
    pub fn up(latency_ms: u64, checked_at_ms: u64) -> Self {
        Self {
            healthy: true,
            latency_ms: Some(latency_ms),
            checked_at_ms,
        }
    }

    pub fn down(checked_at_ms: u64) -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            checked_at_ms,
        }
    }
}
