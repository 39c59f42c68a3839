//! Energy readings and the fleet-wide cost surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::NodeId;

/// Where an energy reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    /// Live data from the Electricity Maps API.
    ElectricityMaps,
    /// Static per-zone profile used when the market source is down.
    Fallback,
}

impl EnergySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergySource::ElectricityMaps => "electricity_maps",
            EnergySource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EnergySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time energy conditions for one grid zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyReading {
    /// Grid zone code (e.g. `"FI"`, `"DE"`).
    pub zone: String,
    /// Effective electricity price in USD per kWh.
    pub price_per_kwh: f64,
    /// Grid carbon intensity in gCO2 per kWh.
    pub carbon_intensity: f64,
    /// Share of generation from renewables, 0 to 100.
    pub renewable_percent: f64,
    /// True when the zone is likely curtailing excess renewables.
    pub curtailment_active: bool,
    pub source: EnergySource,
    /// When the reading was taken, Unix milliseconds.
    pub last_updated_ms: u64,
}

impl EnergyReading {
    /// Synthesize a reading from a node's static energy cost, used when
    /// no market data exists for its zone.
    pub fn fallback(zone: impl Into<String>, price_per_kwh: f64, now_ms: u64) -> Self {
        Self {
            zone: zone.into(),
            price_per_kwh,
            carbon_intensity: 0.0,
            renewable_percent: 0.0,
            curtailment_active: false,
            source: EnergySource::Fallback,
            last_updated_ms: now_ms,
        }
    }
}

/// Per-node snapshot of energy conditions, rebuilt on every oracle poll
/// and swapped in atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSurface {
    /// Latest reading per node id.
    pub locations: HashMap<NodeId, EnergyReading>,
    /// Node with the lowest effective price, first wins on ties.
    pub cheapest_node: Option<NodeId>,
    /// Node with the lowest carbon intensity, first wins on ties.
    pub greenest_node: Option<NodeId>,
    /// When the surface was last rebuilt, Unix milliseconds. Zero means
    /// the oracle has never completed a poll.
    pub updated_at_ms: u64,
}

impl CostSurface {
    pub fn get(&self, node_id: &str) -> Option<&EnergyReading> {
        self.locations.get(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Milliseconds since the last rebuild. Saturates at `now_ms` for a
    /// surface that never polled.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.updated_at_ms)
    }

    /// True when the surface has polled at least once and is younger
    /// than `max_age_ms`.
    pub fn is_fresh(&self, now_ms: u64, max_age_ms: u64) -> bool {
        self.updated_at_ms > 0 && self.age_ms(now_ms) < max_age_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(zone: &str, price: f64) -> EnergyReading {
        EnergyReading {
            zone: zone.to_string(),
            price_per_kwh: price,
            carbon_intensity: 120.0,
            renewable_percent: 55.0,
            curtailment_active: false,
            source: EnergySource::ElectricityMaps,
            last_updated_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_source_serializes_snake_case() {
        let json = serde_json::to_string(&EnergySource::ElectricityMaps).expect("serialize");
        assert_eq!(json, "\"electricity_maps\"");
        let json = serde_json::to_string(&EnergySource::Fallback).expect("serialize");
        assert_eq!(json, "\"fallback\"");
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let json = serde_json::to_value(reading("FI", 0.033)).expect("serialize");
        assert!(json.get("pricePerKwh").is_some());
        assert!(json.get("carbonIntensity").is_some());
        assert!(json.get("curtailmentActive").is_some());
    }

    #[test]
    fn test_fallback_reading_is_marked() {
        let r = EnergyReading::fallback("DE", 0.08, 5_000);
        assert_eq!(r.source, EnergySource::Fallback);
        assert_eq!(r.carbon_intensity, 0.0);
        assert!(!r.curtailment_active);
    }

    #[test]
    fn test_surface_freshness() {
        let mut surface = CostSurface::default();
        // never polled
        assert!(!surface.is_fresh(10_000, 900_000));

        surface.updated_at_ms = 1_000_000;
        assert!(surface.is_fresh(1_000_500, 900_000));
        assert!(!surface.is_fresh(1_000_000 + 900_000, 900_000));
        assert_eq!(surface.age_ms(1_400_000), 400_000);
    }

    #[test]
    fn test_surface_lookup() {
        let mut surface = CostSurface::default();
        surface
            .locations
            .insert("windfall-fi-01".to_string(), reading("FI", 0.033));
        assert!(surface.get("windfall-fi-01").is_some());
        assert!(surface.get("windfall-de-01").is_none());
    }
}
