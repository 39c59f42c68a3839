//! ETH/USD spot price with a short-lived cache.
//!
//! ETH payments are valued at verification time, so the verifier needs
//! an exchange rate but not a precise one; the acceptance threshold is
//! deliberately loose. A stale or unavailable feed therefore degrades
//! to the last known price instead of failing the payment.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RpcError;

/// Price assumed before the feed has ever answered.
pub const DEFAULT_ETH_PRICE_USD: f64 = 2800.0;

/// How long a fetched price stays fresh.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(5 * 60);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const COINGECKO_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd";

/// Source of the current ETH/USD exchange rate.
#[async_trait]
pub trait EthUsdSource: Send + Sync {
    async fn eth_usd(&self) -> Result<f64, RpcError>;
}

/// CoinGecko spot price client.
#[derive(Clone)]
pub struct CoinGeckoSource {
    client: Client,
}

impl CoinGeckoSource {
    pub fn new() -> Result<Self, RpcError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EthUsdSource for CoinGeckoSource {
    async fn eth_usd(&self) -> Result<f64, RpcError> {
        let response = self.client.get(COINGECKO_URL).send().await?;
        if !response.status().is_success() {
            return Err(RpcError::invalid_response(format!(
                "price feed returned {}",
                response.status()
            )));
        }
        let parsed: PriceResponse = response.json().await?;
        debug!(price_usd = parsed.ethereum.usd, "fetched ETH price");
        Ok(parsed.ethereum.usd)
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    ethereum: PriceEntry,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    usd: f64,
}

/// Caching wrapper around an [`EthUsdSource`].
///
/// Refreshes at most once per TTL and keeps serving the last fetched
/// price when the feed errors.
pub struct EthPriceCache {
    source: Arc<dyn EthUsdSource>,
    ttl: Duration,
    /// (price, fetched_at_ms); fetched_at 0 means never fetched.
    cached: Mutex<(f64, u64)>,
}

impl EthPriceCache {
    pub fn new(source: Arc<dyn EthUsdSource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_PRICE_TTL,
            cached: Mutex::new((DEFAULT_ETH_PRICE_USD, 0)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The current ETH/USD price, refreshing if the cache expired.
    pub async fn current(&self) -> f64 {
        let now = now_ms();
        {
            let cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
            let (price, fetched_at) = *cached;
            if fetched_at > 0 && now.saturating_sub(fetched_at) < self.ttl.as_millis() as u64 {
                return price;
            }
        }

        // Fetch outside the lock; two concurrent misses fetching twice
        // is harmless.
        match self.source.eth_usd().await {
            Ok(price) => {
                let mut cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
                *cached = (price, now);
                price
            }
            Err(e) => {
                warn!(error = %e, "ETH price fetch failed, keeping cached price");
                let cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
                cached.0
            }
        }
    }
}

impl std::fmt::Debug for EthPriceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("EthPriceCache")
            .field("ttl", &self.ttl)
            .field("cached", &*cached)
            .finish()
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
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedSource {
        calls: AtomicU32,
        fail: bool,
        price: f64,
    }

    impl ScriptedSource {
        fn ok(price: f64) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: false,
                price,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: true,
                price: 0.0,
            }
        }
    }

    #[async_trait]
    impl EthUsdSource for ScriptedSource {
        async fn eth_usd(&self) -> Result<f64, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RpcError::invalid_response("feed down"))
            } else {
                Ok(self.price)
            }
        }
    }

    #[tokio::test]
    async fn test_price_cached_within_ttl() {
        let source = Arc::new(ScriptedSource::ok(3100.0));
        let cache = EthPriceCache::new(source.clone());

        assert_eq!(cache.current().await, 3100.0);
        assert_eq!(cache.current().await, 3100.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_refetches_every_call() {
        let source = Arc::new(ScriptedSource::ok(3100.0));
        let cache = EthPriceCache::new(source.clone()).with_ttl(Duration::ZERO);

        cache.current().await;
        cache.current().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_default() {
        let source = Arc::new(ScriptedSource::failing());
        let cache = EthPriceCache::new(source);

        assert_eq!(cache.current().await, DEFAULT_ETH_PRICE_USD);
    }

    #[test]
    fn test_coingecko_response_shape() {
        let parsed: PriceResponse =
            serde_json::from_str(r#"{"ethereum":{"usd":2987.41}}"#).unwrap();
        assert_eq!(parsed.ethereum.usd, 2987.41);
    }
}
