//! Cost surface construction and the poll loop.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};
use windfall_types::{CostSurface, EnergyReading, EnergySource, NodeId, NodeInfo};

use crate::config::OracleConfig;
use crate::estimator::{PricingEstimator, RenewableDiscountEstimator};
use crate::source::{ElectricityMapsClient, EnergyDataSource, SourceError, ZoneReadings};

/// Renewable share above which a zone is considered to be curtailing.
const CURTAILMENT_RENEWABLE_PCT: f64 = 85.0;
/// Carbon intensity below which the surplus is actually clean.
const CURTAILMENT_MAX_CARBON: f64 = 50.0;

/// Maintains the fleet-wide [`CostSurface`].
///
/// Readers call [`surface`](Self::surface) for a consistent snapshot;
/// the poll loop rebuilds the whole surface and swaps it in one write.
pub struct EnergyOracle {
    config: OracleConfig,
    source: Arc<dyn EnergyDataSource>,
    estimator: Arc<dyn PricingEstimator>,
    surface: RwLock<Arc<CostSurface>>,
}

impl EnergyOracle {
    /// Creates an oracle backed by the Electricity Maps API.
    pub fn new(config: OracleConfig) -> Result<Self, SourceError> {
        let source = ElectricityMapsClient::new(&config.base_url, config.api_token.clone())?;
        Ok(Self {
            config,
            source: Arc::new(source),
            estimator: Arc::new(RenewableDiscountEstimator::new()),
            surface: RwLock::new(Arc::new(CostSurface::default())),
        })
    }

    /// Replaces the data source. Used by tests and alternate providers.
    pub fn with_source(mut self, source: Arc<dyn EnergyDataSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn PricingEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Current surface snapshot. Cheap to call; the `Arc` is cloned, not
    /// the map.
    pub fn surface(&self) -> Arc<CostSurface> {
        let guard = self
            .surface
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Reading for one node, if the surface has polled it.
    pub fn energy_for_node(&self, node_id: &str) -> Option<EnergyReading> {
        self.surface().get(node_id).cloned()
    }

    /// True once at least one poll has completed and the surface is
    /// younger than the configured max age.
    pub fn is_healthy(&self) -> bool {
        let max_age_ms = self.config.max_age.as_millis() as u64;
        self.surface().is_fresh(now_ms(), max_age_ms)
    }

    /// Polls every zone once and swaps in the rebuilt surface.
    ///
    /// Zone fetch failures degrade that node to its fallback profile;
    /// the rebuild itself always succeeds.
    pub async fn poll_once(&self) {
        let now = now_ms();
        let fetches = self.config.nodes.iter().map(|node| async move {
            let result = self.source.fetch_zone(&node.grid_zone).await;
            (node, result)
        });
        let results = futures::future::join_all(fetches).await;

        let mut surface = CostSurface {
            updated_at_ms: now,
            ..CostSurface::default()
        };
        let mut cheapest: Option<(&NodeId, f64)> = None;
        let mut greenest: Option<(&NodeId, f64)> = None;

        for (node, result) in &results {
            let reading = match result {
                Ok(readings) => self.build_reading(node, readings, now),
                Err(err) => {
                    warn!(
                        node = %node.id,
                        zone = %node.grid_zone,
                        error = %err,
                        "zone fetch failed, using fallback profile"
                    );
                    fallback_reading(&node.grid_zone, now)
                }
            };
            if cheapest.map_or(true, |(_, price)| reading.price_per_kwh < price) {
                cheapest = Some((&node.id, reading.price_per_kwh));
            }
            if greenest.map_or(true, |(_, carbon)| reading.carbon_intensity < carbon) {
                greenest = Some((&node.id, reading.carbon_intensity));
            }
            surface.locations.insert(node.id.clone(), reading);
        }
        surface.cheapest_node = cheapest.map(|(id, _)| id.clone());
        surface.greenest_node = greenest.map(|(id, _)| id.clone());

        for (node, _) in &results {
            if let Some(reading) = surface.get(&node.id) {
                let mut flags = String::new();
                if surface.cheapest_node.as_deref() == Some(node.id.as_str()) {
                    flags.push_str(" [CHEAPEST]");
                }
                if surface.greenest_node.as_deref() == Some(node.id.as_str()) {
                    flags.push_str(" [GREENEST]");
                }
                if reading.curtailment_active {
                    flags.push_str(" [CURTAILMENT]");
                }
                info!(
                    node = %node.id,
                    zone = %node.grid_zone,
                    source = %reading.source,
                    "${:.4}/kWh, {}g CO2, {}% renewable{}",
                    reading.price_per_kwh,
                    reading.carbon_intensity,
                    reading.renewable_percent,
                    flags
                );
            }
        }

        let mut guard = self
            .surface
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(surface);
    }

    /// Polls immediately, then on every interval tick.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    fn build_reading(&self, node: &NodeInfo, readings: &ZoneReadings, now: u64) -> EnergyReading {
        let renewable = readings.renewable_percent;
        let price = self.estimator.price_per_kwh(&node.grid_zone, renewable);
        // A zero carbon reading means the API has no data, not a
        // perfectly clean grid.
        let carbon_for_check = readings
            .carbon_intensity
            .filter(|c| *c != 0.0)
            .unwrap_or(999.0);
        let curtailment =
            renewable > CURTAILMENT_RENEWABLE_PCT && carbon_for_check < CURTAILMENT_MAX_CARBON;
        EnergyReading {
            zone: node.grid_zone.clone(),
            price_per_kwh: price,
            carbon_intensity: readings.carbon_intensity.unwrap_or(0.0),
            renewable_percent: (renewable * 10.0).round() / 10.0,
            curtailment_active: curtailment,
            source: EnergySource::ElectricityMaps,
            last_updated_ms: now,
        }
    }
}

/// Static per-zone profile used when the live fetch fails.
fn fallback_reading(zone: &str, now: u64) -> EnergyReading {
    let (price, carbon, renewable) = match zone {
        "DE" => (0.08, 350.0, 50.0),
        "FI" => (0.033, 90.0, 75.0),
        _ => (0.06, 200.0, 40.0),
    };
    EnergyReading {
        zone: zone.to_string(),
        price_per_kwh: price,
        carbon_intensity: carbon,
        renewable_percent: renewable,
        curtailment_active: false,
        source: EnergySource::Fallback,
        last_updated_ms: now,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;

    struct StaticSource {
        zones: HashMap<String, ZoneReadings>,
    }

    impl StaticSource {
        fn new(entries: &[(&str, f64, Option<f64>)]) -> Self {
            let zones = entries
                .iter()
                .map(|(zone, renewable, carbon)| {
                    (
                        zone.to_string(),
                        ZoneReadings {
                            renewable_percent: *renewable,
                            carbon_intensity: *carbon,
                        },
                    )
                })
                .collect();
            Self { zones }
        }
    }

    #[async_trait]
    impl EnergyDataSource for StaticSource {
        async fn fetch_zone(&self, zone: &str) -> Result<ZoneReadings, SourceError> {
            self.zones
                .get(zone)
                .cloned()
                .ok_or_else(|| SourceError::api(404, zone))
        }
    }

    fn test_oracle(nodes: Vec<NodeInfo>, source: StaticSource) -> EnergyOracle {
        EnergyOracle::new(OracleConfig::new(nodes))
            .unwrap()
            .with_source(Arc::new(source))
    }

    fn two_nodes() -> Vec<NodeInfo> {
        vec![
            NodeInfo::new("windfall-de-01", "Berlin, Germany", "10.0.0.1", "DE"),
            NodeInfo::new("windfall-fi-01", "Helsinki, Finland", "10.0.0.2", "FI"),
        ]
    }

    #[tokio::test]
    async fn test_poll_builds_surface() {
        let source = StaticSource::new(&[("DE", 45.0, Some(380.0)), ("FI", 82.5, Some(65.0))]);
        let oracle = test_oracle(two_nodes(), source);
        oracle.poll_once().await;

        let surface = oracle.surface();
        assert_eq!(surface.locations.len(), 2);

        let de = surface.get("windfall-de-01").unwrap();
        assert_eq!(de.price_per_kwh, 0.08);
        assert_eq!(de.carbon_intensity, 380.0);
        assert_eq!(de.renewable_percent, 45.0);
        assert_eq!(de.source, EnergySource::ElectricityMaps);

        // 82.5% renewables puts FI in the 0.5x discount bracket
        let fi = surface.get("windfall-fi-01").unwrap();
        assert!((fi.price_per_kwh - 0.0165).abs() < 1e-9);

        assert_eq!(surface.cheapest_node.as_deref(), Some("windfall-fi-01"));
        assert_eq!(surface.greenest_node.as_deref(), Some("windfall-fi-01"));
    }

    #[tokio::test]
    async fn test_ties_keep_first_node() {
        let nodes = vec![
            NodeInfo::new("node-a", "A", "10.0.0.1", "SE"),
            NodeInfo::new("node-b", "B", "10.0.0.2", "SE"),
        ];
        let source = StaticSource::new(&[("SE", 60.0, Some(30.0))]);
        let oracle = test_oracle(nodes, source);
        oracle.poll_once().await;

        let surface = oracle.surface();
        assert_eq!(surface.cheapest_node.as_deref(), Some("node-a"));
        assert_eq!(surface.greenest_node.as_deref(), Some("node-a"));
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back() {
        let oracle = test_oracle(two_nodes(), StaticSource::new(&[("FI", 70.0, Some(100.0))]));
        oracle.poll_once().await;

        let surface = oracle.surface();
        let de = surface.get("windfall-de-01").unwrap();
        assert_eq!(de.source, EnergySource::Fallback);
        assert_eq!(de.price_per_kwh, 0.08);
        assert_eq!(de.carbon_intensity, 350.0);
        assert_eq!(de.renewable_percent, 50.0);
        assert!(!de.curtailment_active);

        let fi = surface.get("windfall-fi-01").unwrap();
        assert_eq!(fi.source, EnergySource::ElectricityMaps);
    }

    #[tokio::test]
    async fn test_curtailment_needs_high_renewables_and_low_carbon() {
        let cases = [
            // (renewable, carbon, expected)
            (90.0, Some(30.0), true),
            (90.0, Some(60.0), false),
            (80.0, Some(30.0), false),
            (90.0, None, false),
            (90.0, Some(0.0), false),
        ];
        for (renewable, carbon, expected) in cases {
            let nodes = vec![NodeInfo::new("node-a", "A", "10.0.0.1", "SE")];
            let source = StaticSource::new(&[("SE", renewable, carbon)]);
            let oracle = test_oracle(nodes, source);
            oracle.poll_once().await;
            let surface = oracle.surface();
            assert_eq!(
                surface.get("node-a").unwrap().curtailment_active,
                expected,
                "renewable={renewable} carbon={carbon:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_renewable_percent_rounded_to_one_decimal() {
        let nodes = vec![NodeInfo::new("node-a", "A", "10.0.0.1", "SE")];
        let source = StaticSource::new(&[("SE", 66.666, Some(120.0))]);
        let oracle = test_oracle(nodes, source);
        oracle.poll_once().await;
        assert_eq!(
            oracle.surface().get("node-a").unwrap().renewable_percent,
            66.7
        );
    }

    #[tokio::test]
    async fn test_health_requires_a_completed_poll() {
        let source = StaticSource::new(&[("DE", 50.0, Some(300.0)), ("FI", 75.0, Some(90.0))]);
        let oracle = test_oracle(two_nodes(), source);
        assert!(!oracle.is_healthy());

        oracle.poll_once().await;
        assert!(oracle.is_healthy());
    }

    #[tokio::test]
    async fn test_energy_for_node() {
        let source = StaticSource::new(&[("DE", 50.0, Some(300.0)), ("FI", 75.0, Some(90.0))]);
        let oracle = test_oracle(two_nodes(), source);
        oracle.poll_once().await;

        assert!(oracle.energy_for_node("windfall-de-01").is_some());
        assert!(oracle.energy_for_node("unknown").is_none());
    }
}
