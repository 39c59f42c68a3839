//! Electricity price estimation.
//!
//! Spot price feeds are not available on the Electricity Maps free
//! tier, so the default estimator derives an effective price from a
//! per-zone baseline and the live renewable share: a grid flooded with
//! renewables tends toward cheap (sometimes negative) spot prices.

use std::collections::HashMap;

/// Estimates an effective USD/kWh price for a zone.
pub trait PricingEstimator: Send + Sync {
    /// `renewable_percent` is the unrounded share of renewables in the
    /// zone's current consumption mix, 0 to 100.
    fn price_per_kwh(&self, zone: &str, renewable_percent: f64) -> f64;
}

/// Baseline price per zone, discounted as the renewable share rises.
///
/// Discount steps: above 90% renewables the price drops to 0.3x the
/// baseline (likely curtailment), above 80% to 0.5x, above 70% to 0.7x.
#[derive(Debug, Clone)]
pub struct RenewableDiscountEstimator {
    base_prices: HashMap<String, f64>,
    default_base_price: f64,
}

impl RenewableDiscountEstimator {
    pub fn new() -> Self {
        let mut base_prices = HashMap::new();
        // Germany: ~€80/MWh average
        base_prices.insert("DE".to_string(), 0.08);
        // Finland: ~€33/MWh average (Nordic hydro)
        base_prices.insert("FI".to_string(), 0.033);
        Self {
            base_prices,
            default_base_price: 0.06,
        }
    }

    /// Override or add a zone baseline.
    pub fn with_base_price(mut self, zone: impl Into<String>, usd_per_kwh: f64) -> Self {
        self.base_prices.insert(zone.into(), usd_per_kwh);
        self
    }

    pub fn with_default_base_price(mut self, usd_per_kwh: f64) -> Self {
        self.default_base_price = usd_per_kwh;
        self
    }

    fn base_price(&self, zone: &str) -> f64 {
        self.base_prices
            .get(zone)
            .copied()
            .unwrap_or(self.default_base_price)
    }
}

impl Default for RenewableDiscountEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingEstimator for RenewableDiscountEstimator {
    fn price_per_kwh(&self, zone: &str, renewable_percent: f64) -> f64 {
        let multiplier = if renewable_percent > 90.0 {
            0.3
        } else if renewable_percent > 80.0 {
            0.5
        } else if renewable_percent > 70.0 {
            0.7
        } else {
            1.0
        };
        self.base_price(zone) * multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_zone_baselines() {
        let estimator = RenewableDiscountEstimator::new();
        assert_eq!(estimator.price_per_kwh("DE", 0.0), 0.08);
        assert_eq!(estimator.price_per_kwh("FI", 0.0), 0.033);
        assert_eq!(estimator.price_per_kwh("SE", 0.0), 0.06);
    }

    #[test]
    fn test_discount_steps() {
        let estimator = RenewableDiscountEstimator::new();
        // thresholds are strict
        assert_eq!(estimator.price_per_kwh("SE", 70.0), 0.06);
        assert!((estimator.price_per_kwh("SE", 70.1) - 0.042).abs() < 1e-9);
        assert!((estimator.price_per_kwh("SE", 80.0) - 0.042).abs() < 1e-9);
        assert!((estimator.price_per_kwh("SE", 80.1) - 0.03).abs() < 1e-9);
        assert!((estimator.price_per_kwh("SE", 90.0) - 0.03).abs() < 1e-9);
        assert!((estimator.price_per_kwh("SE", 95.0) - 0.018).abs() < 1e-9);
    }

    #[test]
    fn test_custom_baseline() {
        let estimator = RenewableDiscountEstimator::new().with_base_price("NO", 0.025);
        assert_eq!(estimator.price_per_kwh("NO", 50.0), 0.025);
    }
}
