//! Per-request pricing.
//!
//! The gateway charges a flat USD price per completion rather than
//! metering tokens; the table maps model ids to that price. Savings
//! reported to API key holders compare the charged price against
//! `direct_cost`, the estimated price of calling the provider without
//! the gateway's engagement-based model substitution.

use std::collections::HashMap;

use windfall_types::RoutingMode;

/// Estimated direct-to-provider cost per request for premium models.
pub const DIRECT_COST_PREMIUM: f64 = 0.008;
/// Estimated direct-to-provider cost per request for everything else.
pub const DIRECT_COST_STANDARD: f64 = 0.006;

const DEFAULT_PREMIUM_PRICE: f64 = 0.005;
const DEFAULT_PRICE: f64 = 0.002;

/// Flat per-request price table with a premium-prefix fallback.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    /// Exact model id overrides.
    prices: HashMap<String, f64>,
    /// Model id prefixes billed at the premium price when no exact
    /// override exists.
    premium_prefixes: Vec<String>,
    premium_price: f64,
    default_price: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        let mut prices = HashMap::new();
        prices.insert("deepseek/deepseek-chat-v3-0324".to_string(), 0.001);
        prices.insert("meta-llama/llama-3.1-8b-instruct".to_string(), 0.0005);
        prices.insert("google/gemini-2.0-flash-001".to_string(), 0.001);
        Self {
            prices,
            premium_prefixes: vec!["anthropic/".to_string(), "openai/".to_string()],
            premium_price: DEFAULT_PREMIUM_PRICE,
            default_price: DEFAULT_PRICE,
        }
    }
}

impl ModelPricing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or override the price for one model.
    pub fn with_price(mut self, model: impl Into<String>, price_usd: f64) -> Self {
        self.prices.insert(model.into(), price_usd);
        self
    }

    pub fn with_default_price(mut self, price_usd: f64) -> Self {
        self.default_price = price_usd;
        self
    }

    pub fn with_premium_price(mut self, price_usd: f64) -> Self {
        self.premium_price = price_usd;
        self
    }

    pub fn default_price(&self) -> f64 {
        self.default_price
    }

    pub fn premium_price(&self) -> f64 {
        self.premium_price
    }

    /// List price for a model: exact entry, then premium prefix, then
    /// the default.
    pub fn price_for(&self, model: &str) -> f64 {
        if let Some(price) = self.prices.get(model) {
            return *price;
        }
        if self.is_premium(model) {
            return self.premium_price;
        }
        self.default_price
    }

    /// Whether the model belongs to a premium provider family.
    pub fn is_premium(&self, model: &str) -> bool {
        self.premium_prefixes.iter().any(|p| model.starts_with(p.as_str()))
    }

    /// Direct-to-provider cost estimate used in savings bookkeeping.
    pub fn direct_cost(&self, model: &str) -> f64 {
        if self.is_premium(model) {
            DIRECT_COST_PREMIUM
        } else {
            DIRECT_COST_STANDARD
        }
    }

    /// Final charged price: list price, plus the green surcharge when
    /// the request routes in greenest mode.
    pub fn quote(&self, model: &str, mode: RoutingMode, green_surcharge: f64) -> f64 {
        let price = self.price_for(model);
        match mode {
            RoutingMode::Greenest => price * (1.0 + green_surcharge),
            _ => price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_price_wins_over_prefix() {
        let pricing = ModelPricing::new().with_price("openai/gpt-4o-mini", 0.0008);
        assert_eq!(pricing.price_for("openai/gpt-4o-mini"), 0.0008);
        assert_eq!(pricing.price_for("openai/gpt-4o"), DEFAULT_PREMIUM_PRICE);
    }

    #[test]
    fn test_unknown_model_gets_default_price() {
        let pricing = ModelPricing::new();
        assert_eq!(pricing.price_for("mistralai/mistral-small"), DEFAULT_PRICE);
    }

    #[test]
    fn test_premium_detection() {
        let pricing = ModelPricing::new();
        assert!(pricing.is_premium("anthropic/claude-sonnet-4"));
        assert!(pricing.is_premium("openai/gpt-4o"));
        assert!(!pricing.is_premium("deepseek/deepseek-chat-v3-0324"));
    }

    #[test]
    fn test_direct_cost_by_tier() {
        let pricing = ModelPricing::new();
        assert_eq!(pricing.direct_cost("openai/gpt-4o"), DIRECT_COST_PREMIUM);
        assert_eq!(pricing.direct_cost("deepseek/deepseek-chat-v3-0324"), DIRECT_COST_STANDARD);
    }

    #[test]
    fn test_greenest_mode_applies_surcharge() {
        let pricing = ModelPricing::new();
        let list = pricing.price_for("deepseek/deepseek-chat-v3-0324");

        let green = pricing.quote("deepseek/deepseek-chat-v3-0324", RoutingMode::Greenest, 0.10);
        assert!((green - list * 1.10).abs() < 1e-12);

        let cheap = pricing.quote("deepseek/deepseek-chat-v3-0324", RoutingMode::Cheapest, 0.10);
        assert_eq!(cheap, list);
        let balanced = pricing.quote("deepseek/deepseek-chat-v3-0324", RoutingMode::Balanced, 0.10);
        assert_eq!(balanced, list);
    }
}
