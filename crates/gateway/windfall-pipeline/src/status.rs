//! Operator-facing health and status reports.
//!
//! `health` is the cheap probe target for load balancers; `status` is
//! the full report an operator or dashboard reads. Both are assembled
//! from live component state, nothing here is cached.

use std::collections::HashMap;

use serde::Serialize;
use windfall_store::{CacheStats, UsageStats};
use windfall_types::{NodeHealth, RoutingMode};

use crate::error::PipelineResult;
use crate::pipeline::GatewayNode;

/// Liveness summary. Degraded means the cost surface has gone stale,
/// not that inference is down.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    pub status: &'static str,
    pub node: String,
    pub location: String,
    pub oracle: &'static str,
    /// Seconds since this node started.
    pub uptime: u64,
    pub version: &'static str,
}

/// Node identity block of the status report.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
}

/// Energy market view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleStatus {
    pub healthy: bool,
    /// Unix millis of the last successful surface refresh.
    pub last_updated: u64,
    pub cheapest_node: Option<String>,
    pub greenest_node: Option<String>,
    pub locations: usize,
}

/// Price card advertised to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingStatus {
    pub default: f64,
    pub premium: f64,
    pub green_surcharge: String,
    pub currency: &'static str,
    pub accepts: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStatus {
    pub modes: Vec<&'static str>,
    pub default_mode: &'static str,
}

/// Full operator status report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub gateway: &'static str,
    pub version: &'static str,
    pub node: NodeSummary,
    pub oracle: OracleStatus,
    pub pricing: PricingStatus,
    pub routing: RoutingStatus,
    pub node_health: HashMap<String, NodeHealth>,
    pub cache: CacheStats,
    pub usage: UsageStats,
}

impl GatewayNode {
    /// Liveness report for `/health`.
    pub fn health(&self) -> GatewayHealth {
        let fresh = self.oracle.is_healthy();
        GatewayHealth {
            status: if fresh { "healthy" } else { "degraded" },
            node: self.config.node_id.clone(),
            location: self.config.node_location.clone(),
            oracle: if fresh { "ok" } else { "stale" },
            uptime: self.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Full report for `/status`: identity, market view, price card,
    /// fleet health, cache and usage counters.
    pub fn status(&self) -> PipelineResult<GatewayStatus> {
        let surface = self.oracle.surface();
        Ok(GatewayStatus {
            gateway: "Windfall",
            version: env!("CARGO_PKG_VERSION"),
            node: NodeSummary {
                id: self.config.node_id.clone(),
                location: self.config.node_location.clone(),
                lat: self.config.lat,
                lon: self.config.lon,
            },
            oracle: OracleStatus {
                healthy: self.oracle.is_healthy(),
                last_updated: surface.updated_at_ms,
                cheapest_node: surface.cheapest_node.clone(),
                greenest_node: surface.greenest_node.clone(),
                locations: surface.locations.len(),
            },
            pricing: PricingStatus {
                default: self.pricing().default_price(),
                premium: self.pricing().premium_price(),
                green_surcharge: format!("{}%", (self.config.green_surcharge * 100.0).round()),
                currency: "USD",
                accepts: vec!["ETH", "USDC", "x402"],
            },
            routing: RoutingStatus {
                modes: vec![
                    RoutingMode::Cheapest.as_str(),
                    RoutingMode::Greenest.as_str(),
                    RoutingMode::Balanced.as_str(),
                ],
                default_mode: RoutingMode::default().as_str(),
            },
            node_health: self.peer_health.snapshot(),
            cache: self.cache().stats()?,
            usage: self.state.request_log.usage_stats()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_camel_case() {
        let status = GatewayStatus {
            gateway: "Windfall",
            version: "0.4.1",
            node: NodeSummary {
                id: "wf-sto".to_string(),
                location: "Stockholm".to_string(),
                lat: 59.33,
                lon: 18.07,
            },
            oracle: OracleStatus {
                healthy: true,
                last_updated: 1_700_000_000_000,
                cheapest_node: Some("wf-sto".to_string()),
                greenest_node: None,
                locations: 3,
            },
            pricing: PricingStatus {
                default: 0.002,
                premium: 0.005,
                green_surcharge: "10%".to_string(),
                currency: "USD",
                accepts: vec!["ETH", "USDC", "x402"],
            },
            routing: RoutingStatus {
                modes: vec!["cheapest", "greenest", "balanced"],
                default_mode: "greenest",
            },
            node_health: HashMap::new(),
            cache: CacheStats::default(),
            usage: UsageStats::default(),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["gateway"], "Windfall");
        assert_eq!(json["oracle"]["lastUpdated"], 1_700_000_000_000u64);
        assert_eq!(json["oracle"]["cheapestNode"], "wf-sto");
        assert_eq!(json["pricing"]["greenSurcharge"], "10%");
        assert_eq!(json["routing"]["defaultMode"], "greenest");
        assert!(json["nodeHealth"].is_object());
    }

    #[test]
    fn test_health_report_shape() {
        let health = GatewayHealth {
            status: "healthy",
            node: "wf-sto".to_string(),
            location: "Stockholm".to_string(),
            oracle: "ok",
            uptime: 42,
            version: "0.4.1",
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["oracle"], "ok");
        assert_eq!(json["uptime"], 42);
    }
}
