//! Request pipeline orchestration.
//!
//! [`GatewayNode`] owns one node's view of the fleet and runs every
//! inference request through the same stages: validate, identify,
//! classify, price, cache lookup, payment, routing, execution,
//! billing, bookkeeping. The entry point is [`GatewayNode::handle`],
//! which never fails; infrastructure errors become 500 responses and
//! validation errors become 400s.
//!
//! Billing discipline: a request is charged at most once. Requests
//! forwarded to a peer are charged before the forward so the peer can
//! trust the payment-verified marker; if the forward then fails and
//! the request falls back to local execution, the earlier charge
//! stands and no second one is made.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use windfall_cache::{should_bypass, SemanticCache};
use windfall_engage::{ClassifyInput, EngagementClassifier, ModelTiers};
use windfall_oracle::EnergyOracle;
use windfall_pay::{
    BaseRpcClient, CoinGeckoSource, EthPriceCache, OnchainVerifier, PayDenial, PaymentOutcome,
    PaymentResolver,
};
use windfall_route::{route, HealthRegistry};
use windfall_store::{DeductOutcome, GatewayState, RequestRecord};
use windfall_types::{
    completion_model, completion_usage, CallerIdentity, EnergyReading, EngagementLevel,
    FreeTierAccount, PaymentResolution, RoutingMode,
};
use windfall_x402::{
    PaymentGate, PaymentRequired, PaymentResponse, X402Config, HEADER_PAYMENT_REQUIRED,
    HEADER_PAYMENT_RESPONSE,
};

use crate::attestation::{AttestationData, AttestationSink};
use crate::config::GatewayConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pricing::ModelPricing;
use crate::provider::{CompletionCall, InferenceProvider};
use crate::proxy::PeerForwarder;
use crate::request::{request_id, GatewayRequest};
use crate::response::{
    format_usd, GatewayResponse, PaymentMethodsHint, PaymentRequiredBody, WindfallExtension,
    HEADER_CACHE, HEADER_COST, HEADER_ENGAGEMENT, HEADER_MODE, HEADER_MODEL, HEADER_NODE,
    HEADER_SAVED,
};

/// Resource path quoted in payment requirements.
const RESOURCE_URL: &str = "/v1/chat/completions";

/// One gateway node: holds every collaborator a request touches.
///
/// Construction wires the components together; per-request work is
/// all in [`GatewayNode::handle`]. The node is cheap to share behind
/// an `Arc` and every method takes `&self`.
pub struct GatewayNode {
    /// Node identity and fleet configuration.
    pub config: GatewayConfig,
    /// Persistent stores.
    pub state: GatewayState,
    /// Energy market oracle feeding routing and receipts.
    pub oracle: Arc<EnergyOracle>,
    /// Fleet probe results used to filter routing candidates.
    pub peer_health: Arc<HealthRegistry>,
    cache: SemanticCache,
    classifier: EngagementClassifier,
    resolver: PaymentResolver,
    pricing: ModelPricing,
    provider: Arc<dyn InferenceProvider>,
    forwarder: Option<Arc<dyn PeerForwarder>>,
    attestations: Option<Arc<dyn AttestationSink>>,
    /// Terms advertised in PAYMENT-REQUIRED headers.
    payment_terms: X402Config,
    node_start: Instant,
}

impl GatewayNode {
    /// Build a node from pre-wired payment plumbing.
    pub fn new(
        config: GatewayConfig,
        state: GatewayState,
        oracle: Arc<EnergyOracle>,
        provider: Arc<dyn InferenceProvider>,
        resolver: PaymentResolver,
    ) -> PipelineResult<Self> {
        let peer_health = Arc::new(
            HealthRegistry::new(config.port).map_err(|e| PipelineError::Setup(e.to_string()))?,
        );
        let cache = SemanticCache::new(state.response_cache.clone());
        let mut payment_terms = X402Config::mainnet(&config.wallet_address);
        payment_terms.asset = config.usdc_address.clone();
        Ok(Self {
            cache,
            classifier: EngagementClassifier::new(ModelTiers::default()),
            resolver,
            pricing: ModelPricing::default(),
            provider,
            forwarder: None,
            attestations: None,
            payment_terms,
            peer_health,
            config,
            state,
            oracle,
            node_start: Instant::now(),
        })
    }

    /// Build a node with the stock payment chain: Base RPC for
    /// transfer verification, CoinGecko for ETH pricing, x402
    /// disabled.
    pub fn with_default_payments(
        config: GatewayConfig,
        state: GatewayState,
        oracle: Arc<EnergyOracle>,
        provider: Arc<dyn InferenceProvider>,
    ) -> PipelineResult<Self> {
        let rpc = BaseRpcClient::new(&config.base_rpc_url)
            .map_err(|e| PipelineError::Setup(e.to_string()))?;
        let price_source =
            CoinGeckoSource::new().map_err(|e| PipelineError::Setup(e.to_string()))?;
        let verifier = OnchainVerifier::new(
            Arc::new(rpc),
            EthPriceCache::new(Arc::new(price_source)),
            state.tx_ledger.clone(),
            &config.wallet_address,
            &config.usdc_address,
        );
        let resolver = PaymentResolver::new(
            state.free_tier.clone(),
            state.api_keys.clone(),
            verifier,
            Arc::new(PaymentGate::disabled()),
            config.nodes.clone(),
        )
        .with_wallet_free_requests(config.wallet_free_requests);
        Self::new(config, state, oracle, provider, resolver)
    }

    /// Enable node-to-node forwarding. Without a forwarder every
    /// request executes locally regardless of the routing decision.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn PeerForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Attach an attestation sink; submissions are spawned off the
    /// request path.
    pub fn with_attestation_sink(mut self, sink: Arc<dyn AttestationSink>) -> Self {
        self.attestations = Some(sink);
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_tiers(mut self, tiers: ModelTiers) -> Self {
        self.classifier = EngagementClassifier::new(tiers);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = self.cache.with_ttl(ttl);
        self
    }

    pub fn pricing(&self) -> &ModelPricing {
        &self.pricing
    }

    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.node_start.elapsed().as_secs()
    }

    /// Run one inference request through the pipeline.
    ///
    /// Never fails: validation problems become a 400, payment
    /// shortfalls a 402, infrastructure errors a 500 carrying the
    /// request id for log correlation.
    pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
        let request_id = request_id();
        let started = Instant::now();
        debug!(
            request_id = %request_id,
            messages = request.body.messages.len(),
            "inference request received"
        );
        match self.process(&request, &request_id, started).await {
            Ok(response) => response,
            Err(PipelineError::EmptyMessages) => {
                GatewayResponse::bad_request("messages array is required")
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    code = %e.error_code(),
                    error = %e,
                    "inference request failed"
                );
                GatewayResponse::internal_error(&request_id)
            }
        }
    }

    async fn process(
        &self,
        request: &GatewayRequest,
        request_id: &str,
        started: Instant,
    ) -> PipelineResult<GatewayResponse> {
        // 1. Validate.
        if request.body.messages.is_empty() {
            return Err(PipelineError::EmptyMessages);
        }

        // 2. Identify the caller and classify engagement. The
        //    classification picks the model when the caller asked for
        //    auto-selection.
        let identity = self
            .resolver
            .identify(&request.body, &request.headers)
            .await?;
        let caller_key = identity.engagement_key(request_id);
        let engagement = self.classifier.classify(ClassifyInput {
            messages: &request.body.messages,
            priority: request.headers.priority.as_deref(),
            requested_model: request.body.requested_model(),
            caller_key: &caller_key,
        });

        // 3. Price the request. Greenest routing carries a surcharge.
        let model = request
            .body
            .requested_model()
            .map(str::to_string)
            .unwrap_or_else(|| engagement.auto_model.clone());
        let mode = request
            .body
            .mode
            .as_deref()
            .and_then(RoutingMode::parse)
            .unwrap_or_default();
        let price_usd = self.pricing.quote(&model, mode, self.config.green_surcharge);

        // 4. Cache lookup. A hit answers for free without touching
        //    payment at all.
        let scope = identity.cache_scope(request_id);
        let bypass = should_bypass(request.headers.cache_control.as_deref());
        if !bypass {
            if let Some(hit) = self.cache.get(&request.body.messages, &model, &scope)? {
                let energy = self.local_energy();
                let usage = completion_usage(&hit.response);
                let wallet = identity.wallet_address().unwrap_or("cache_hit").to_string();

                if let Err(e) = self.cache.record_savings(&hit.cache_key, price_usd) {
                    warn!(request_id = %request_id, error = %e, "failed to record cache savings");
                }
                let record = RequestRecord {
                    id: request_id.to_string(),
                    wallet_address: wallet,
                    node_id: self.config.node_id.clone(),
                    model: model.clone(),
                    mode: mode.as_str().to_string(),
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                    energy_price_kwh: energy.price_per_kwh,
                    carbon_intensity: energy.carbon_intensity,
                    cost_usd: 0.0,
                    payment_method: "cache_hit".to_string(),
                    response_time_ms: started.elapsed().as_millis() as u64,
                    attestation_uid: None,
                };
                if let Err(e) = self.state.request_log.insert(&record) {
                    warn!(request_id = %request_id, error = %e, "failed to log request");
                }

                info!(request_id = %request_id, saved_usd = price_usd, "cache hit");
                let ext = self.extension(mode, &energy, 0.0, true, engagement.level, Some(price_usd));
                return Ok(GatewayResponse::json(200, ext.attach(hit.response))
                    .with_header(HEADER_CACHE, "HIT")
                    .with_header(HEADER_MODE, mode.as_str())
                    .with_header(HEADER_MODEL, &model)
                    .with_header(HEADER_ENGAGEMENT, engagement.level.as_str())
                    .with_header(HEADER_NODE, &self.config.node_id)
                    .with_header(HEADER_COST, format_usd(0.0))
                    .with_header(HEADER_SAVED, format_usd(price_usd)));
            }
        }

        // 5. Resolve payment.
        let outcome = self
            .resolver
            .resolve(
                &identity,
                &request.body,
                &request.headers,
                &request.client_ip,
                price_usd,
            )
            .await?;
        let resolution = match outcome {
            PaymentOutcome::Approved(resolution) => resolution,
            PaymentOutcome::Denied(denial) => {
                info!(request_id = %request_id, price_usd, "payment required");
                return Ok(self.payment_required(&denial, price_usd, &model, mode, engagement.level));
            }
        };
        let proxied = matches!(
            resolution,
            PaymentResolution::FreeTier {
                account: FreeTierAccount::Proxied
            }
        );

        // 6. Route. The decision may point at a peer.
        let surface = self.oracle.surface();
        let candidates = self.peer_health.healthy_candidates(&self.config.nodes);
        let self_node = self.config.self_node();
        let decision = route(mode, &candidates, &surface, &self_node, now_ms());

        // 7. Forward to the selected peer, charging first so the peer
        //    can trust the payment-verified marker. A forward failure
        //    falls through to local execution without charging again.
        let mut billed = false;
        if !decision.is_local(&self.config.node_id) {
            if let Some(forwarder) = &self.forwarder {
                if !proxied {
                    self.charge(&resolution, &model, price_usd)?;
                    billed = true;
                }
                let mut forward_body = request.body.clone();
                forward_body.model = Some(model.clone());
                forward_body.payment_verified = Some(true);
                match forwarder
                    .forward(
                        &decision.node,
                        &forward_body,
                        &self.config.node_id,
                        identity.wallet_address(),
                    )
                    .await
                {
                    Ok(reply) => {
                        info!(
                            request_id = %request_id,
                            node = %decision.node.id,
                            status = reply.status,
                            "request served by peer"
                        );
                        return Ok(GatewayResponse::json(reply.status, reply.body));
                    }
                    Err(e) => {
                        warn!(
                            request_id = %request_id,
                            node = %decision.node.id,
                            error = %e,
                            "peer forward failed, serving locally"
                        );
                    }
                }
            }
        }

        // 8. Execute locally.
        let call = CompletionCall {
            model: model.clone(),
            messages: request.body.messages.clone(),
            temperature: request.body.temperature,
            max_tokens: request
                .body
                .max_tokens
                .map(|t| t.min(self.config.max_tokens_cap)),
        };
        let reply = self.provider.complete(call).await?;
        let completion = reply.completion;
        let usage = completion_usage(&completion);
        let reported_model = completion_model(&completion).unwrap_or(&model).to_string();
        let energy = self
            .oracle
            .energy_for_node(&self.config.node_id)
            .unwrap_or_else(|| decision.energy.clone());

        if !bypass {
            if let Err(e) = self
                .cache
                .put(&request.body.messages, &model, &scope, &completion, &usage)
            {
                warn!(request_id = %request_id, error = %e, "failed to cache completion");
            }
        }

        // 9. Bill, unless the pre-forward charge already happened or
        //    the entry node billed before forwarding to us.
        if !billed && !proxied {
            self.charge(&resolution, &model, price_usd)?;
        }

        // 10. Bookkeeping: request log, revenue, attestation. None of
        //     these failures reach the caller.
        let wallet = wallet_label(&identity, &resolution);
        let record = RequestRecord {
            id: request_id.to_string(),
            wallet_address: wallet.clone(),
            node_id: self.config.node_id.clone(),
            model: reported_model.clone(),
            mode: mode.as_str().to_string(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            energy_price_kwh: energy.price_per_kwh,
            carbon_intensity: energy.carbon_intensity,
            cost_usd: price_usd,
            payment_method: resolution.method_name().to_string(),
            response_time_ms: started.elapsed().as_millis() as u64,
            attestation_uid: None,
        };
        if let Err(e) = self.state.request_log.insert(&record) {
            warn!(request_id = %request_id, error = %e, "failed to log request");
        }
        if resolution.is_revenue() {
            if let Err(e) = self.state.request_log.log_revenue(
                &wallet,
                price_usd,
                resolution.method_name(),
                resolution.tx_hash(),
            ) {
                warn!(request_id = %request_id, error = %e, "failed to log revenue");
            }
        }
        self.queue_attestation(request_id, &reported_model, &energy);

        info!(
            request_id = %request_id,
            model = %reported_model,
            node = %self.config.node_id,
            cost_usd = price_usd,
            method = resolution.method_name(),
            latency_ms = reply.latency_ms,
            "inference served"
        );

        let ext = self.extension(mode, &energy, price_usd, false, engagement.level, None);
        let mut response = GatewayResponse::json(200, ext.attach(completion))
            .with_header(HEADER_CACHE, "MISS")
            .with_header(HEADER_MODE, mode.as_str())
            .with_header(HEADER_MODEL, &reported_model)
            .with_header(HEADER_ENGAGEMENT, engagement.level.as_str())
            .with_header(HEADER_NODE, &self.config.node_id)
            .with_header(HEADER_COST, format_usd(price_usd));

        if let PaymentResolution::X402 {
            transaction, payer, ..
        } = &resolution
        {
            if !transaction.is_empty() {
                let receipt = PaymentResponse {
                    success: true,
                    transaction: Some(transaction.clone()),
                    network: Some(self.payment_terms.network.clone()),
                    payer: Some(payer.clone()),
                };
                match receipt.to_header() {
                    Ok(value) => response = response.with_header(HEADER_PAYMENT_RESPONSE, value),
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "failed to encode payment receipt")
                    }
                }
            }
        }
        Ok(response)
    }

    /// Apply the charge a resolution calls for. Transfer and x402
    /// resolutions were paid before execution and deduct nothing here.
    fn charge(
        &self,
        resolution: &PaymentResolution,
        model: &str,
        price_usd: f64,
    ) -> PipelineResult<()> {
        match resolution {
            PaymentResolution::FreeTier {
                account: FreeTierAccount::Wallet(wallet),
            } => {
                self.state.free_tier.consume(wallet)?;
            }
            PaymentResolution::FreeTier {
                account: FreeTierAccount::ApiKey(key_id),
            } => {
                self.deduct_key(*key_id, model, price_usd)?;
            }
            PaymentResolution::ApiKeyBalance { key_id, .. } => {
                self.deduct_key(*key_id, model, price_usd)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn deduct_key(&self, key_id: i64, model: &str, price_usd: f64) -> PipelineResult<()> {
        let saved_usd = (self.pricing.direct_cost(model) - price_usd).max(0.0);
        let outcome = self.state.api_keys.deduct_request(key_id, price_usd, saved_usd)?;
        if outcome == DeductOutcome::Unfunded {
            warn!(key_id, "key drained between spend check and deduction");
        }
        Ok(())
    }

    /// Build the 402 for a payment denial. Every variant carries the
    /// machine-readable PAYMENT-REQUIRED header next to a body that
    /// tells a human (or an agent's error handler) what to do.
    fn payment_required(
        &self,
        denial: &PayDenial,
        price_usd: f64,
        model: &str,
        mode: RoutingMode,
        engagement: EngagementLevel,
    ) -> GatewayResponse {
        let wallet = &self.config.wallet_address;
        let body = match denial {
            PayDenial::SessionExhausted { kind } => {
                let mut b = PaymentRequiredBody::base(price_usd, wallet);
                b.message = Some(format!(
                    "Agent session active ({}), but free tier exhausted. Pay per request \
                     via x402, tx hash, or create an API key with balance.",
                    kind.label()
                ));
                b
            }
            PayDenial::KeyRejected { reason } => {
                let mut b = PaymentRequiredBody::base(price_usd, wallet);
                b.message = Some(reason.clone());
                b.model = Some(model.to_string());
                b.mode = Some(mode);
                b.engagement = Some(engagement);
                b.topup = Some("/topup".to_string());
                b.hint = Some(
                    "Top up your API key balance via card at /topup, or send ETH/USDC on \
                     Base to the wallet address, or use x402 protocol"
                        .to_string(),
                );
                b
            }
            PayDenial::TxRejected { reason } => {
                let mut b = PaymentRequiredBody::base(price_usd, wallet);
                b.message = Some(reason.clone());
                b
            }
            PayDenial::FreeTierExhausted => {
                let mut b = PaymentRequiredBody::base(price_usd, wallet);
                b.model = Some(model.to_string());
                b.mode = Some(mode);
                b.engagement = Some(engagement);
                b.free_tier_remaining = Some(0);
                b.hint = Some(
                    "Get an API key at POST /api/keys, include X-Payment-TX header with a \
                     Base tx hash, or use x402 protocol"
                        .to_string(),
                );
                b
            }
            PayDenial::X402Failed { reason } => PaymentRequiredBody {
                error: "x402 payment failed".to_string(),
                message: Some(reason.clone()),
                x402_version: 2,
                price_usd,
                model: Some(model.to_string()),
                mode: Some(mode),
                engagement: None,
                wallet: None,
                pay_to: Some(wallet.clone()),
                network: format!("Base ({})", self.payment_terms.network),
                chain_id: None,
                accepts: None,
                asset: Some(self.config.usdc_address.clone()),
                free_tier_remaining: None,
                topup: None,
                hint: None,
                methods: None,
            },
            PayDenial::NoPayment => {
                let mut b = PaymentRequiredBody::base(price_usd, wallet);
                b.model = Some(model.to_string());
                b.mode = Some(mode);
                b.methods = Some(PaymentMethodsHint::default());
                b
            }
        };

        let mut response = GatewayResponse::json(
            402,
            serde_json::to_value(&body).unwrap_or(Value::Null),
        );
        let terms =
            PaymentRequired::for_inference(RESOURCE_URL, "LLM inference", price_usd, &self.payment_terms);
        match terms.to_header() {
            Ok(value) => response = response.with_header(HEADER_PAYMENT_REQUIRED, value),
            Err(e) => warn!(error = %e, "failed to encode payment requirements"),
        }
        response
    }

    /// Energy reading for this node, falling back to the configured
    /// baseline when the oracle has nothing.
    fn local_energy(&self) -> EnergyReading {
        self.oracle
            .energy_for_node(&self.config.node_id)
            .unwrap_or_else(|| {
                let node = self.config.self_node();
                EnergyReading::fallback(&node.grid_zone, node.energy_cost_per_kwh, now_ms())
            })
    }

    fn extension(
        &self,
        mode: RoutingMode,
        energy: &EnergyReading,
        cost_usd: f64,
        cached: bool,
        engagement: EngagementLevel,
        saved_usd: Option<f64>,
    ) -> WindfallExtension {
        WindfallExtension {
            node: self.config.node_id.clone(),
            location: self.config.node_location.clone(),
            mode,
            energy_price_per_kwh: energy.price_per_kwh,
            carbon_intensity_g_co2: energy.carbon_intensity,
            renewable_percent: energy.renewable_percent,
            curtailment_active: energy.curtailment_active,
            cost_usd,
            cached,
            engagement,
            saved_usd,
        }
    }

    /// Hand a verifiable execution record to the attestation sink off
    /// the request path. Submission failures only surface in logs.
    fn queue_attestation(&self, request_id: &str, model: &str, energy: &EnergyReading) {
        let Some(sink) = &self.attestations else {
            return;
        };
        let sink = Arc::clone(sink);
        let data = AttestationData {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            node_id: self.config.node_id.clone(),
            lat: self.config.lat,
            lon: self.config.lon,
            energy_price_per_kwh: energy.price_per_kwh,
            carbon_intensity: energy.carbon_intensity,
            curtailment_active: energy.curtailment_active,
            model: model.to_string(),
            response_hash: request_id.to_string(),
            request_count: 1,
        };
        tokio::spawn(async move {
            if let Err(e) = sink.submit(data).await {
                debug!(error = %e, "attestation submission failed");
            }
        });
    }
}

impl fmt::Debug for GatewayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayNode")
            .field("node_id", &self.config.node_id)
            .field("peers", &self.config.nodes.len())
            .finish_non_exhaustive()
    }
}

/// Label a request is logged under. Prefers the paying address, then
/// the caller's wallet, then a method-specific placeholder.
fn wallet_label(identity: &CallerIdentity, resolution: &PaymentResolution) -> String {
    match resolution {
        PaymentResolution::EthTransfer { payer, .. }
        | PaymentResolution::UsdcTransfer { payer, .. } => payer.clone(),
        PaymentResolution::X402 { payer, .. } => {
            if payer.is_empty() {
                "x402".to_string()
            } else {
                payer.clone()
            }
        }
        PaymentResolution::FreeTier {
            account: FreeTierAccount::Wallet(wallet),
        } => wallet.clone(),
        PaymentResolution::FreeTier {
            account: FreeTierAccount::ApiKey(key_id),
        }
        | PaymentResolution::ApiKeyBalance { key_id, .. } => identity
            .wallet_address()
            .map(str::to_string)
            .unwrap_or_else(|| format!("key:{key_id}")),
        PaymentResolution::FreeTier {
            account: FreeTierAccount::Proxied,
        } => identity.wallet_address().unwrap_or("proxied").to_string(),
        PaymentResolution::None => identity.wallet_address().unwrap_or("unknown").to_string(),
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
    use async_trait::async_trait;
    use serde_json::json;
    use windfall_oracle::OracleConfig;
    use windfall_types::{ChatMessage, ChatRequest, RequestHeaders};
    use windfall_x402::usd_to_atomic;

    use crate::provider::{ProviderError, ProviderReply};

    const WALLET: &str = "0x1111111111111111111111111111111111111111";
    const GATEWAY_WALLET: &str = "0x2222222222222222222222222222222222222222";

    struct StaticProvider(Value);

    impl Default for StaticProvider {
        fn default() -> Self {
            Self(json!({
                "id": "gen-1",
                "model": "deepseek/deepseek-chat-v3-0324",
                "choices": [{"message": {"role": "assistant", "content": "hello"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
            }))
        }
    }

    #[async_trait]
    impl InferenceProvider for StaticProvider {
        async fn complete(&self, _call: CompletionCall) -> Result<ProviderReply, ProviderError> {
            Ok(ProviderReply {
                completion: self.0.clone(),
                latency_ms: 5,
            })
        }
    }

    fn test_node() -> GatewayNode {
        let state = GatewayState::open_in_memory().unwrap();
        let oracle = Arc::new(EnergyOracle::new(OracleConfig::new(Vec::new())).unwrap());
        let config = GatewayConfig::new("wf-sto", "Stockholm")
            .with_wallet_address(GATEWAY_WALLET)
            .with_coordinates(59.33, 18.07);
        GatewayNode::with_default_payments(config, state, oracle, Arc::new(StaticProvider::default()))
            .unwrap()
    }

    fn chat(content: &str) -> ChatRequest {
        ChatRequest::from_messages(vec![ChatMessage::user(content)])
    }

    #[tokio::test]
    async fn test_empty_messages_rejected() {
        let node = test_node();
        let response = node.handle(GatewayRequest::new(ChatRequest::default())).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "messages array is required");
    }

    #[tokio::test]
    async fn test_anonymous_request_gets_payment_required() {
        let node = test_node();
        let response = node.handle(GatewayRequest::new(chat("hi"))).await;
        assert_eq!(response.status, 402);
        assert_eq!(response.body["error"], "Payment required");
        assert_eq!(response.body["network"], "Base");
        assert_eq!(response.body["chainId"], 8453);
        assert!(response.body["methods"]["x402"].is_string());
        assert!(response.header(HEADER_PAYMENT_REQUIRED).is_some());
    }

    #[tokio::test]
    async fn test_payment_required_header_decodes_with_atomic_price() {
        let node = test_node();
        let mut body = chat("hi");
        body.model = Some("deepseek/deepseek-chat-v3-0324".to_string());
        body.mode = Some("greenest".to_string());
        let response = node.handle(GatewayRequest::new(body)).await;
        assert_eq!(response.status, 402);

        let header = response.header(HEADER_PAYMENT_REQUIRED).unwrap();
        let terms = PaymentRequired::from_header(header).unwrap();
        let requirement = &terms.accepts[0];
        // 0.001 list price plus the 10% green surcharge.
        assert_eq!(requirement.max_amount_required, usd_to_atomic(0.0011).to_string());
        assert_eq!(requirement.network, "eip155:8453");
        assert_eq!(requirement.pay_to, GATEWAY_WALLET);
    }

    #[tokio::test]
    async fn test_wallet_free_tier_request_succeeds_and_consumes() {
        let node = test_node();
        let request = GatewayRequest::new(chat("hi"))
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        let response = node.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header(HEADER_CACHE), Some("MISS"));
        assert_eq!(response.body["windfall"]["cached"], false);

        let status = node.state.free_tier.status(WALLET, 25).unwrap();
        assert_eq!(status.used, 1);
        assert_eq!(status.remaining, 24);
    }

    #[tokio::test]
    async fn test_cache_hit_is_free_and_skips_consumption() {
        let node = test_node();
        let mut body = chat("cache me");
        body.model = Some("deepseek/deepseek-chat-v3-0324".to_string());

        let first = GatewayRequest::new(body.clone())
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        let response = node.handle(first).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header(HEADER_CACHE), Some("MISS"));
        assert_eq!(node.state.free_tier.status(WALLET, 25).unwrap().used, 1);

        let second = GatewayRequest::new(body)
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        let response = node.handle(second).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header(HEADER_CACHE), Some("HIT"));
        assert_eq!(response.header(HEADER_COST), Some("$0.0000"));
        assert!(response.header(HEADER_SAVED).is_some());
        assert_eq!(response.body["windfall"]["cached"], true);
        assert_eq!(response.body["windfall"]["costUsd"], 0.0);
        // Still one free request consumed; the hit was free.
        assert_eq!(node.state.free_tier.status(WALLET, 25).unwrap().used, 1);
    }

    #[tokio::test]
    async fn test_cache_control_bypasses_lookup() {
        let node = test_node();
        let mut body = chat("fresh please");
        body.model = Some("deepseek/deepseek-chat-v3-0324".to_string());

        let first = GatewayRequest::new(body.clone())
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        assert_eq!(node.handle(first).await.header(HEADER_CACHE), Some("MISS"));

        let second = GatewayRequest::new(body).with_headers(
            RequestHeaders::new()
                .with_wallet_address(WALLET)
                .with_cache_control("no-cache"),
        );
        let response = node.handle(second).await;
        assert_eq!(response.header(HEADER_CACHE), Some("MISS"));
        assert_eq!(node.state.free_tier.status(WALLET, 25).unwrap().used, 2);
    }

    #[tokio::test]
    async fn test_greenest_surcharge_in_cost_header() {
        let node = test_node();
        let mut body = chat("price check");
        body.model = Some("deepseek/deepseek-chat-v3-0324".to_string());
        body.mode = Some("greenest".to_string());
        let request = GatewayRequest::new(body)
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        let response = node.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header(HEADER_COST), Some("$0.0011"));
        assert_eq!(response.header(HEADER_MODE), Some("greenest"));
    }

    #[tokio::test]
    async fn test_cheapest_mode_skips_surcharge() {
        let node = test_node();
        let mut body = chat("price check");
        body.model = Some("deepseek/deepseek-chat-v3-0324".to_string());
        body.mode = Some("cheapest".to_string());
        let request = GatewayRequest::new(body)
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        let response = node.handle(request).await;
        assert_eq!(response.header(HEADER_COST), Some("$0.0010"));
    }

    #[tokio::test]
    async fn test_request_logged_with_free_tier_method() {
        let node = test_node();
        let request = GatewayRequest::new(chat("log me"))
            .with_headers(RequestHeaders::new().with_wallet_address(WALLET));
        node.handle(request).await;

        let stats = node.state.request_log.usage_stats().unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.total_revenue_usd, 0.0);
    }

    #[test]
    fn test_wallet_label_prefers_payer() {
        let identity = CallerIdentity::Wallet(WALLET.to_string());
        let resolution = PaymentResolution::EthTransfer {
            tx_hash: "0xdead".to_string(),
            payer: "0xfeed".to_string(),
            amount_usd: 0.01,
        };
        assert_eq!(wallet_label(&identity, &resolution), "0xfeed");
    }

    #[test]
    fn test_wallet_label_key_without_wallet_uses_key_id() {
        let identity = CallerIdentity::ApiKey {
            key_id: 7,
            wallet_address: None,
        };
        let resolution = PaymentResolution::ApiKeyBalance {
            key_id: 7,
            amount_usd: 0.002,
        };
        assert_eq!(wallet_label(&identity, &resolution), "key:7");
    }

    #[test]
    fn test_wallet_label_x402_placeholder() {
        let identity = CallerIdentity::Anonymous;
        let resolution = PaymentResolution::X402 {
            transaction: String::new(),
            payer: String::new(),
            amount_usd: 0.002,
        };
        assert_eq!(wallet_label(&identity, &resolution), "x402");
    }
}
