//! Oracle configuration.

use std::time::Duration;

use windfall_types::NodeInfo;

/// Default polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Age after which the surface counts as stale.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// Electricity Maps API v3 base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.electricitymap.org/v3";

/// Configuration for the energy oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Fleet nodes; each contributes one surface entry keyed by node id.
    pub nodes: Vec<NodeInfo>,
    pub poll_interval: Duration,
    /// Surface older than this is reported unhealthy.
    pub max_age: Duration,
    /// Electricity Maps API token. Without one the API rejects the
    /// request and the oracle runs entirely on fallback profiles.
    pub api_token: Option<String>,
    pub base_url: String,
}

impl OracleConfig {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self {
            nodes,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_age: DEFAULT_MAX_AGE,
            api_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OracleConfig::new(vec![]);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.max_age, Duration::from_secs(900));
        assert!(config.api_token.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builders() {
        let config = OracleConfig::new(vec![])
            .with_api_token("em-token")
            .with_poll_interval(Duration::from_secs(60));
        assert_eq!(config.api_token.as_deref(), Some("em-token"));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }
}
