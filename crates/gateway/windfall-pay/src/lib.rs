//! Payment resolution for the Windfall gateway.
//!
//! Inference is pay-per-request. A request can pay in five ways, tried
//! strongest credential first:
//!
//! | Credential | Charged via |
//! |---|---|
//! | Forwarded from a peer node | Nothing; entry node billed |
//! | Wallet session (SIWE / ERC-8004) | Wallet free tier, then tx hash |
//! | API key (`Bearer wf_...`) | Key free requests, then prepaid balance |
//! | Bare wallet address | Wallet free tier, then tx hash |
//! | None | x402 `PAYMENT-SIGNATURE` payload |
//!
//! The chain ends in a [`PaymentOutcome`]: either an approval carrying
//! the concrete [`windfall_types::PaymentResolution`] to bill against,
//! or a [`PayDenial`] the gateway turns into a 402 response.
//!
//! # Components
//!
//! - **[`resolver`]**: the resolution chain itself
//! - **[`identity`]**: credential extraction from headers and body
//! - **[`verify`]**: onchain ETH/USDC transfer verification with
//!   replay protection
//! - **[`chain`]**: JSON-RPC access to Base
//! - **[`price`]**: cached ETH/USD feed for valuing ETH payments
//! - **[`session`]**: wallet session lookup seam
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use windfall_pay::{
//!     BaseRpcClient, CoinGeckoSource, EthPriceCache, OnchainVerifier, PaymentOutcome,
//!     PaymentResolver, DEFAULT_BASE_RPC_URL,
//! };
//! use windfall_store::GatewayState;
//! use windfall_types::{ChatRequest, RequestHeaders};
//! use windfall_x402::PaymentGate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = GatewayState::open_in_memory()?;
//! let rpc = Arc::new(BaseRpcClient::new(DEFAULT_BASE_RPC_URL)?);
//! let price = EthPriceCache::new(Arc::new(CoinGeckoSource::new()?));
//! let verifier = OnchainVerifier::new(
//!     rpc,
//!     price,
//!     state.tx_ledger.clone(),
//!     "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0",
//!     "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
//! );
//! let resolver = PaymentResolver::new(
//!     state.free_tier.clone(),
//!     state.api_keys.clone(),
//!     verifier,
//!     Arc::new(PaymentGate::disabled()),
//!     vec![],
//! );
//!
//! let body = ChatRequest::default();
//! let headers = RequestHeaders::new().with_wallet_address("0x70997970c51812dc3a010c7d01b50e0d17dc79c8");
//! let identity = resolver.identify(&body, &headers).await?;
//! match resolver.resolve(&identity, &body, &headers, "198.51.100.7", 0.27).await? {
//!     PaymentOutcome::Approved(resolution) => println!("pay via {}", resolution.method_name()),
//!     PaymentOutcome::Denied(denial) => println!("402: {denial:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod error;
pub mod identity;
pub mod price;
pub mod resolver;
pub mod session;
pub mod verify;

pub use chain::{
    BaseRpcClient, ChainReceipt, ChainRpc, ChainTransaction, TransferLog, DEFAULT_BASE_RPC_URL,
};
pub use error::{PayError, PayResult, RpcError};
pub use identity::{extract_api_key, extract_payment_tx, extract_session_token, extract_wallet};
pub use price::{CoinGeckoSource, EthPriceCache, EthUsdSource, DEFAULT_ETH_PRICE_USD};
pub use resolver::{
    PayDenial, PaymentOutcome, PaymentResolver, DEFAULT_WALLET_FREE_REQUESTS,
};
pub use session::SessionStore;
pub use verify::{OnchainVerifier, TRANSFER_TOPIC};
