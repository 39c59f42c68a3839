//! The payment resolution chain.
//!
//! Every request resolves to exactly one payment before it executes.
//! Credentials are tried strongest-first:
//!
//! 1. Trusted peer forwarding (the entry node already billed)
//! 2. Wallet session, free tier first, then a quoted tx hash
//! 3. API key, free requests first, then prepaid balance
//! 4. Bare wallet address, free tier first, then a quoted tx hash
//! 5. Anonymous x402 payment via the `PAYMENT-SIGNATURE` header
//!
//! Resolution is split in two: [`PaymentResolver::identify`] runs
//! before the cache lookup so cache scoping and engagement tracking
//! see the caller, and [`PaymentResolver::resolve`] runs only on a
//! cache miss, because cache hits are free.

use std::sync::Arc;

use tracing::{debug, info};
use windfall_store::{ApiKeyStore, FreeTierStore, SpendCheck};
use windfall_types::{
    AgentSession, CallerIdentity, ChatRequest, FreeTierAccount, NodeInfo, PaymentResolution,
    RequestHeaders, SessionKind,
};
use windfall_x402::{PaymentGate, X402Error};

use crate::error::{PayError, PayResult};
use crate::identity::{extract_api_key, extract_payment_tx, extract_session_token, extract_wallet};
use crate::session::SessionStore;
use crate::verify::OnchainVerifier;

/// Free requests granted per bare wallet address.
pub const DEFAULT_WALLET_FREE_REQUESTS: u32 = 25;

/// Resource URL quoted in x402 payment requirements when none is
/// configured.
const DEFAULT_RESOURCE_URL: &str = "/v1/chat/completions";

/// Outcome of payment resolution for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The request may execute; bill it per the resolution.
    Approved(PaymentResolution),
    /// The request must be answered with 402.
    Denied(PayDenial),
}

/// Why a request cannot proceed. Each variant maps to a distinct 402
/// response body.
#[derive(Debug, Clone, PartialEq)]
pub enum PayDenial {
    /// Live session, but its wallet free tier is used up and no
    /// acceptable payment accompanied the request.
    SessionExhausted { kind: SessionKind },
    /// The API key has neither free requests nor balance left.
    KeyRejected { reason: String },
    /// A payment tx was quoted but failed verification.
    TxRejected { reason: String },
    /// Known wallet with an exhausted free tier and no payment.
    FreeTierExhausted,
    /// An x402 payload was presented but not accepted.
    X402Failed { reason: String },
    /// No credential and no payment of any kind.
    NoPayment,
}

/// Resolves caller identity and payment for inference requests.
pub struct PaymentResolver {
    free_tier: FreeTierStore,
    api_keys: ApiKeyStore,
    verifier: OnchainVerifier,
    gate: Arc<PaymentGate>,
    sessions: Option<Arc<dyn SessionStore>>,
    /// Peer nodes whose forwarded requests arrive pre-billed.
    nodes: Vec<NodeInfo>,
    wallet_free_requests: u32,
    resource_url: String,
}

impl PaymentResolver {
    pub fn new(
        free_tier: FreeTierStore,
        api_keys: ApiKeyStore,
        verifier: OnchainVerifier,
        gate: Arc<PaymentGate>,
        nodes: Vec<NodeInfo>,
    ) -> Self {
        Self {
            free_tier,
            api_keys,
            verifier,
            gate,
            sessions: None,
            nodes,
            wallet_free_requests: DEFAULT_WALLET_FREE_REQUESTS,
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
        }
    }

    /// Attach a session backend. Without one, bearer tokens that are
    /// not API keys never authenticate.
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Override the per-wallet free request grant.
    pub fn with_wallet_free_requests(mut self, grant: u32) -> Self {
        self.wallet_free_requests = grant;
        self
    }

    /// Set the resource URL quoted in x402 requirements.
    pub fn with_resource_url(mut self, url: impl Into<String>) -> Self {
        self.resource_url = url.into();
        self
    }

    /// Resolve who is calling.
    ///
    /// An API key that fails validation falls through to the weaker
    /// identities instead of rejecting the request; the caller may
    /// still pay by wallet or tx hash.
    pub async fn identify(
        &self,
        body: &ChatRequest,
        headers: &RequestHeaders,
    ) -> PayResult<CallerIdentity> {
        if let Some(raw_key) = extract_api_key(headers) {
            if let Some(record) = self.api_keys.validate(raw_key)? {
                debug!(key_id = record.id, "request authenticated by API key");
                return Ok(CallerIdentity::ApiKey {
                    key_id: record.id,
                    wallet_address: record.wallet_address,
                });
            }
            debug!("API key failed validation, trying weaker identities");
        }

        if let Some(sessions) = &self.sessions {
            if let Some(token) = extract_session_token(headers) {
                if let Some(session) = sessions.resolve(token).await {
                    debug!(
                        wallet = %session.wallet_address,
                        kind = %session.kind.label(),
                        "request authenticated by session"
                    );
                    return Ok(CallerIdentity::Session(session));
                }
            }
        }

        if let Some(wallet) = extract_wallet(body, headers) {
            return Ok(CallerIdentity::Wallet(wallet));
        }

        Ok(CallerIdentity::Anonymous)
    }

    /// Walk the payment chain for an already-identified caller.
    pub async fn resolve(
        &self,
        identity: &CallerIdentity,
        body: &ChatRequest,
        headers: &RequestHeaders,
        client_ip: &str,
        price_usd: f64,
    ) -> PayResult<PaymentOutcome> {
        if self.is_trusted_proxy(headers, client_ip) {
            debug!("forwarded request, entry node already billed");
            return Ok(PaymentOutcome::Approved(PaymentResolution::FreeTier {
                account: FreeTierAccount::Proxied,
            }));
        }

        match identity {
            CallerIdentity::Session(session) => {
                self.resolve_session(session, body, headers, price_usd).await
            }
            CallerIdentity::ApiKey { key_id, .. } => self.resolve_api_key(*key_id, price_usd),
            CallerIdentity::Wallet(wallet) => {
                self.resolve_wallet(wallet, body, headers, price_usd).await
            }
            CallerIdentity::Anonymous => self.resolve_anonymous(headers, price_usd).await,
        }
    }

    /// A forwarded request is trusted only when the payment-verified
    /// marker is set and the connection actually comes from the IP of
    /// the peer named in `X-Proxied-From`. Headers alone prove
    /// nothing; the IP match is the gate.
    fn is_trusted_proxy(&self, headers: &RequestHeaders, client_ip: &str) -> bool {
        if headers.payment_verified.as_deref() != Some("true") {
            return false;
        }
        let Some(from_node) = headers.proxied_from.as_deref() else {
            return false;
        };
        self.nodes
            .iter()
            .any(|n| n.id == from_node && client_ip.contains(&n.ip))
    }

    async fn resolve_session(
        &self,
        session: &AgentSession,
        body: &ChatRequest,
        headers: &RequestHeaders,
        price_usd: f64,
    ) -> PayResult<PaymentOutcome> {
        let status = self
            .free_tier
            .status(&session.wallet_address, self.wallet_free_requests)?;
        if status.allowed {
            return Ok(PaymentOutcome::Approved(PaymentResolution::FreeTier {
                account: FreeTierAccount::Wallet(session.wallet_address.clone()),
            }));
        }

        // Exhausted sessions can still pay per request by tx hash. A
        // failed verification leaves the session denial in place; the
        // caller sees the session message, not the tx error.
        if let Some(tx) = extract_payment_tx(body, headers) {
            match self.verifier.verify(tx, price_usd).await {
                Ok(transfer) => {
                    return Ok(PaymentOutcome::Approved(PaymentResolution::from_transfer(
                        transfer,
                    )))
                }
                Err(PayError::Rejected { reason }) => {
                    debug!(reason = %reason, "session payment tx rejected");
                }
                Err(other) => return Err(other),
            }
        }

        Ok(PaymentOutcome::Denied(PayDenial::SessionExhausted {
            kind: session.kind,
        }))
    }

    fn resolve_api_key(&self, key_id: i64, price_usd: f64) -> PayResult<PaymentOutcome> {
        match self.api_keys.can_make_request(key_id, price_usd)? {
            SpendCheck::FreeTier => Ok(PaymentOutcome::Approved(PaymentResolution::FreeTier {
                account: FreeTierAccount::ApiKey(key_id),
            })),
            SpendCheck::Balance => Ok(PaymentOutcome::Approved(
                PaymentResolution::ApiKeyBalance {
                    key_id,
                    amount_usd: price_usd,
                },
            )),
            SpendCheck::Denied { reason } => {
                Ok(PaymentOutcome::Denied(PayDenial::KeyRejected { reason }))
            }
        }
    }

    async fn resolve_wallet(
        &self,
        wallet: &str,
        body: &ChatRequest,
        headers: &RequestHeaders,
        price_usd: f64,
    ) -> PayResult<PaymentOutcome> {
        let status = self.free_tier.status(wallet, self.wallet_free_requests)?;
        if status.allowed {
            return Ok(PaymentOutcome::Approved(PaymentResolution::FreeTier {
                account: FreeTierAccount::Wallet(wallet.to_string()),
            }));
        }

        if let Some(tx) = extract_payment_tx(body, headers) {
            return match self.verifier.verify(tx, price_usd).await {
                Ok(transfer) => Ok(PaymentOutcome::Approved(PaymentResolution::from_transfer(
                    transfer,
                ))),
                Err(PayError::Rejected { reason }) => {
                    Ok(PaymentOutcome::Denied(PayDenial::TxRejected { reason }))
                }
                Err(other) => Err(other),
            };
        }

        Ok(PaymentOutcome::Denied(PayDenial::FreeTierExhausted))
    }

    async fn resolve_anonymous(
        &self,
        headers: &RequestHeaders,
        price_usd: f64,
    ) -> PayResult<PaymentOutcome> {
        if self.gate.is_enabled() {
            if let Some(header) = headers.x402_payload() {
                match self
                    .gate
                    .process_payment(header, &self.resource_url, price_usd)
                    .await
                {
                    Ok(settled) => {
                        info!(payer = %settled.payer, "x402 payment settled");
                        return Ok(PaymentOutcome::Approved(PaymentResolution::X402 {
                            transaction: settled.transaction.unwrap_or_default(),
                            payer: settled.payer,
                            amount_usd: price_usd,
                        }));
                    }
                    // An undecodable header reads as no payment at all,
                    // so the caller gets the full method listing.
                    Err(X402Error::MalformedPayload { reason }) => {
                        debug!(reason = %reason, "ignoring malformed x402 header");
                    }
                    Err(e) => {
                        return Ok(PaymentOutcome::Denied(PayDenial::X402Failed {
                            reason: e.to_string(),
                        }))
                    }
                }
            }
        }

        Ok(PaymentOutcome::Denied(PayDenial::NoPayment))
    }
}

impl std::fmt::Debug for PaymentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentResolver")
            .field("nodes", &self.nodes.len())
            .field("wallet_free_requests", &self.wallet_free_requests)
            .field("sessions", &self.sessions.is_some())
            .field("x402_enabled", &self.gate.is_enabled())
            .finish()
    }
}
