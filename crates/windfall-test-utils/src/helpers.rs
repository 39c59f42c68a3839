//! Helper functions for creating test fixtures.
//!
//! Provides the shared three-node fleet, canned wallets, and
//! pre-configured gateway nodes wired to mocks instead of live chain
//! and market services.

use std::sync::Arc;

use windfall_oracle::{EnergyOracle, OracleConfig};
use windfall_pay::{EthPriceCache, OnchainVerifier, PaymentResolver};
use windfall_pipeline::{GatewayConfig, GatewayNode, GatewayRequest, InferenceProvider};
use windfall_store::GatewayState;
use windfall_types::{ChatMessage, ChatRequest, NodeInfo, RequestHeaders};
use windfall_x402::PaymentGate;

use crate::{MockChainRpc, MockEnergySource, MockEthPrice};

/// Wallet the test gateway collects payments on.
pub const GATEWAY_WALLET: &str = "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0";
/// USDC contract address used in fixtures.
pub const USDC_ADDRESS: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
/// Wallet most fixtures pay from.
pub const PAYER_WALLET: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
/// Transaction hash fixtures seed into the mock chain.
pub const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
/// ETH/USD rate the mock price source pins.
pub const ETH_USD: f64 = 2000.0;

/// The shared three-node test fleet. The first entry doubles as the
/// local node in [`test_config`].
pub fn test_nodes() -> Vec<NodeInfo> {
    vec![
        NodeInfo::new("windfall-de-01", "Berlin, Germany", "10.0.0.1", "DE")
            .with_coordinates(52.52, 13.40),
        NodeInfo::new("windfall-fi-01", "Helsinki, Finland", "10.0.0.2", "FI")
            .with_coordinates(60.17, 24.94)
            .with_energy_cost(0.04),
        NodeInfo::new("windfall-tx-01", "Austin, Texas", "10.0.0.3", "US-TEX-ERCO")
            .with_coordinates(30.27, -97.74)
            .with_energy_cost(0.03),
    ]
}

/// Gateway configuration for the Berlin node of [`test_nodes`].
pub fn test_config() -> GatewayConfig {
    GatewayConfig::new("windfall-de-01", "Berlin, Germany")
        .with_coordinates(52.52, 13.40)
        .with_nodes(test_nodes())
        .with_wallet_address(GATEWAY_WALLET)
        .with_usdc_address(USDC_ADDRESS)
}

/// One user message.
pub fn test_messages(content: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(content)]
}

/// A minimal chat body with one user message.
pub fn chat_request(content: &str) -> ChatRequest {
    ChatRequest::from_messages(test_messages(content))
}

/// A request carrying a wallet address header.
pub fn wallet_request(content: &str, wallet: &str) -> GatewayRequest {
    GatewayRequest::new(chat_request(content))
        .with_headers(RequestHeaders::new().with_wallet_address(wallet))
}

/// An oracle over [`test_nodes`] with an empty surface. Requests still
/// route; selection falls back to configured node costs.
pub fn test_oracle() -> Arc<EnergyOracle> {
    Arc::new(
        EnergyOracle::new(OracleConfig::new(test_nodes()))
            .expect("oracle construction cannot fail with default url"),
    )
}

/// An oracle whose surface is populated from a mock market: Berlin
/// dirty and expensive, Helsinki cleanest, wind-flooded Texas
/// cheapest.
pub async fn seeded_oracle() -> Arc<EnergyOracle> {
    let source = MockEnergySource::new()
        .with_zone("DE", 40.0, 380.0)
        .with_zone("FI", 70.0, 35.0)
        .with_zone("US-TEX-ERCO", 92.0, 110.0);
    let oracle = Arc::new(
        EnergyOracle::new(OracleConfig::new(test_nodes()))
            .expect("oracle construction cannot fail with default url")
            .with_source(Arc::new(source)),
    );
    oracle.poll_once().await;
    oracle
}

/// A payment resolver backed by the given mock chain, with x402
/// disabled and the fixture gateway wallet.
pub fn test_resolver(state: &GatewayState, chain: MockChainRpc) -> PaymentResolver {
    test_resolver_with_gate(state, chain, Arc::new(PaymentGate::disabled()))
}

/// Like [`test_resolver`] but with an explicit x402 gate.
pub fn test_resolver_with_gate(
    state: &GatewayState,
    chain: MockChainRpc,
    gate: Arc<PaymentGate>,
) -> PaymentResolver {
    let verifier = OnchainVerifier::new(
        Arc::new(chain),
        EthPriceCache::new(Arc::new(MockEthPrice(ETH_USD))),
        state.tx_ledger.clone(),
        GATEWAY_WALLET,
        USDC_ADDRESS,
    );
    PaymentResolver::new(
        state.free_tier.clone(),
        state.api_keys.clone(),
        verifier,
        gate,
        test_nodes(),
    )
}

/// A fully wired gateway node over fresh in-memory state: mock chain,
/// empty oracle surface, x402 disabled, no forwarder.
pub fn test_gateway(provider: Arc<dyn InferenceProvider>) -> GatewayNode {
    let state = GatewayState::open_in_memory().expect("in-memory state");
    test_gateway_with(state, MockChainRpc::new(), provider)
}

/// A gateway node over explicit state and chain, for tests that seed
/// transactions or inspect stores afterwards.
pub fn test_gateway_with(
    state: GatewayState,
    chain: MockChainRpc,
    provider: Arc<dyn InferenceProvider>,
) -> GatewayNode {
    let resolver = test_resolver(&state, chain);
    GatewayNode::new(test_config(), state, test_oracle(), provider, resolver)
        .expect("gateway construction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    #[test]
    fn test_fleet_has_three_distinct_zones() {
        let nodes = test_nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].id, "windfall-de-01");
        assert_ne!(nodes[1].grid_zone, nodes[2].grid_zone);
    }

    #[tokio::test]
    async fn test_seeded_oracle_surface_is_fresh() {
        let oracle = seeded_oracle().await;
        assert!(oracle.is_healthy());
        let surface = oracle.surface();
        assert_eq!(surface.locations.len(), 3);
        assert_eq!(surface.cheapest_node.as_deref(), Some("windfall-tx-01"));
        assert_eq!(surface.greenest_node.as_deref(), Some("windfall-fi-01"));
    }

    #[tokio::test]
    async fn test_gateway_serves_wallet_request() {
        let node = test_gateway(Arc::new(MockProvider::new()));
        let response = node.handle(wallet_request("hi", PAYER_WALLET)).await;
        assert_eq!(response.status, 200);
    }
}
