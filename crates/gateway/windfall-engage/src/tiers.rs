//! Model selection per engagement bucket.

use windfall_types::EngagementLevel;

/// Which model serves each engagement bucket, plus the reference
/// prices the savings estimate is derived from.
///
/// The default maps every bucket to the same inexpensive model; fleets
/// that want a stronger hot-path model override it per tier.
#[derive(Debug, Clone)]
pub struct ModelTiers {
    pub hot: String,
    pub warm: String,
    pub cold: String,
    /// List price of the premium model the savings are measured against,
    /// USD per million tokens.
    pub premium_cost: f64,
    /// List price of the tier models, USD per million tokens.
    pub tier_cost: f64,
}

const DEFAULT_TIER_MODEL: &str = "deepseek/deepseek-chat-v3-0324";

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            hot: DEFAULT_TIER_MODEL.to_string(),
            warm: DEFAULT_TIER_MODEL.to_string(),
            cold: DEFAULT_TIER_MODEL.to_string(),
            premium_cost: 3.00,
            tier_cost: 0.27,
        }
    }
}

impl ModelTiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hot(mut self, model: impl Into<String>) -> Self {
        self.hot = model.into();
        self
    }

    pub fn with_warm(mut self, model: impl Into<String>) -> Self {
        self.warm = model.into();
        self
    }

    pub fn with_cold(mut self, model: impl Into<String>) -> Self {
        self.cold = model.into();
        self
    }

    pub fn model_for(&self, level: EngagementLevel) -> &str {
        match level {
            EngagementLevel::Hot => &self.hot,
            EngagementLevel::Warm => &self.warm,
            EngagementLevel::Cold => &self.cold,
        }
    }

    /// Percentage saved by serving a tier model instead of the premium
    /// model.
    pub fn savings_percent(&self) -> u32 {
        if self.premium_cost <= 0.0 {
            return 0;
        }
        ((1.0 - self.tier_cost / self.premium_cost) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_savings_percent() {
        assert_eq!(ModelTiers::default().savings_percent(), 91);
    }

    #[test]
    fn test_model_per_level() {
        let tiers = ModelTiers::new()
            .with_hot("anthropic/claude-sonnet-4")
            .with_cold("meta-llama/llama-3.1-8b-instruct");

        assert_eq!(tiers.model_for(EngagementLevel::Hot), "anthropic/claude-sonnet-4");
        assert_eq!(tiers.model_for(EngagementLevel::Warm), DEFAULT_TIER_MODEL);
        assert_eq!(
            tiers.model_for(EngagementLevel::Cold),
            "meta-llama/llama-3.1-8b-instruct"
        );
    }
}
