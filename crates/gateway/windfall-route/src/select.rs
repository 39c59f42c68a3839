//! Routing mode selection over the cost surface.

use tracing::debug;
use windfall_types::{CostSurface, EnergyReading, NodeInfo, RoutingDecision, RoutingMode};

const NO_DATA_REASON: &str = "no energy data, defaulting to first candidate";

/// Picks the node a request should run on.
///
/// `candidates` is the healthy peer set in fleet configuration order;
/// ties are resolved in favor of the earlier node, so selection is
/// deterministic for a given surface. An empty candidate set routes to
/// `self_node`: serving locally beats refusing the request.
pub fn route(
    mode: RoutingMode,
    candidates: &[NodeInfo],
    surface: &CostSurface,
    self_node: &NodeInfo,
    now_ms: u64,
) -> RoutingDecision {
    if candidates.is_empty() {
        return decision(
            self_node,
            mode,
            surface,
            now_ms,
            "all peers unavailable, routing to self".to_string(),
        );
    }
    let (node, reason) = match mode {
        RoutingMode::Cheapest => pick_cheapest(candidates, surface),
        RoutingMode::Greenest => pick_greenest(candidates, surface),
        RoutingMode::Balanced => pick_balanced(candidates, surface),
    };
    let picked = decision(node, mode, surface, now_ms, reason);
    debug!(
        node = %picked.node.id,
        mode = %picked.mode,
        reason = %picked.reason,
        "routing decision"
    );
    picked
}

fn decision(
    node: &NodeInfo,
    mode: RoutingMode,
    surface: &CostSurface,
    now_ms: u64,
    reason: String,
) -> RoutingDecision {
    let energy = surface.get(&node.id).cloned().unwrap_or_else(|| {
        EnergyReading::fallback(&node.grid_zone, node.energy_cost_per_kwh, now_ms)
    });
    RoutingDecision {
        node: node.clone(),
        mode,
        energy,
        reason,
    }
}

fn pick_cheapest<'a>(candidates: &'a [NodeInfo], surface: &CostSurface) -> (&'a NodeInfo, String) {
    let mut best: Option<(&NodeInfo, f64)> = None;
    for node in candidates {
        if let Some(reading) = surface.get(&node.id) {
            if best.map_or(true, |(_, price)| reading.price_per_kwh < price) {
                best = Some((node, reading.price_per_kwh));
            }
        }
    }
    match best {
        Some((node, price)) => (node, format!("lowest energy price: ${:.4}/kWh", price)),
        None => (&candidates[0], NO_DATA_REASON.to_string()),
    }
}

fn pick_greenest<'a>(candidates: &'a [NodeInfo], surface: &CostSurface) -> (&'a NodeInfo, String) {
    let mut best: Option<(&NodeInfo, f64)> = None;
    for node in candidates {
        if let Some(reading) = surface.get(&node.id) {
            if best.map_or(true, |(_, carbon)| reading.carbon_intensity < carbon) {
                best = Some((node, reading.carbon_intensity));
            }
        }
    }
    match best {
        Some((node, carbon)) => (node, format!("lowest carbon: {}g CO2/kWh", carbon)),
        None => (&candidates[0], NO_DATA_REASON.to_string()),
    }
}

fn pick_balanced<'a>(candidates: &'a [NodeInfo], surface: &CostSurface) -> (&'a NodeInfo, String) {
    let entries: Vec<(&NodeInfo, &EnergyReading)> = candidates
        .iter()
        .filter_map(|node| surface.get(&node.id).map(|reading| (node, reading)))
        .collect();
    if entries.is_empty() {
        return (&candidates[0], NO_DATA_REASON.to_string());
    }

    let min_price = fold_min(entries.iter().map(|(_, r)| r.price_per_kwh));
    let max_price = fold_max(entries.iter().map(|(_, r)| r.price_per_kwh));
    let min_carbon = fold_min(entries.iter().map(|(_, r)| r.carbon_intensity));
    let max_carbon = fold_max(entries.iter().map(|(_, r)| r.carbon_intensity));
    // A degenerate range normalizes everything to 0 instead of NaN.
    let price_range = non_zero(max_price - min_price);
    let carbon_range = non_zero(max_carbon - min_carbon);

    let score_of = |reading: &EnergyReading| {
        (reading.price_per_kwh - min_price) / price_range * 0.5
            + (reading.carbon_intensity - min_carbon) / carbon_range * 0.5
    };

    let (mut best_node, mut best_reading) = entries[0];
    let mut best_score = score_of(best_reading);
    for (node, reading) in entries.iter().skip(1).copied() {
        let score = score_of(reading);
        if score < best_score {
            best_node = node;
            best_reading = reading;
            best_score = score;
        }
    }
    (
        best_node,
        format!(
            "balanced: ${:.4}/kWh + {}g CO2/kWh (score: {:.3})",
            best_reading.price_per_kwh, best_reading.carbon_intensity, best_score
        ),
    )
}

fn fold_min(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::INFINITY, f64::min)
}

fn fold_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, f64::max)
}

fn non_zero(range: f64) -> f64 {
    if range == 0.0 {
        1.0
    } else {
        range
    }
}
