//! Outbound response envelope and wire shapes.
//!
//! The pipeline is transport-agnostic: it returns a [`GatewayResponse`]
//! of status, headers, and a JSON body, and the HTTP layer maps that
//! onto whatever framework hosts the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use windfall_types::{EngagementLevel, RoutingMode};

// ===== Response headers =====

pub const HEADER_CACHE: &str = "X-Windfall-Cache";
pub const HEADER_MODE: &str = "X-Windfall-Mode";
pub const HEADER_MODEL: &str = "X-Windfall-Model";
pub const HEADER_ENGAGEMENT: &str = "X-Windfall-Engagement";
pub const HEADER_NODE: &str = "X-Windfall-Node";
pub const HEADER_COST: &str = "X-Windfall-Cost";
pub const HEADER_SAVED: &str = "X-Windfall-Saved";

/// Dollar amount formatted the way the cost headers report it.
pub fn format_usd(amount: f64) -> String {
    format!("${amount:.4}")
}

// ===== Response envelope =====

/// Status, headers, and JSON body of one pipeline response.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl GatewayResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// 400 with the standard validation body.
    pub fn bad_request(message: &str) -> Self {
        Self::json(400, serde_json::json!({ "error": message }))
    }

    /// 500 carrying the request id so callers can report it.
    pub fn internal_error(request_id: &str) -> Self {
        Self::json(
            500,
            serde_json::json!({
                "error": "Internal server error",
                "request_id": request_id,
            }),
        )
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value recorded for a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ===== Windfall extension =====

/// Energy and billing metadata embedded in every completion under the
/// `windfall` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindfallExtension {
    pub node: String,
    pub location: String,
    pub mode: RoutingMode,
    pub energy_price_per_kwh: f64,
    #[serde(rename = "carbonIntensityGCO2")]
    pub carbon_intensity_g_co2: f64,
    pub renewable_percent: f64,
    pub curtailment_active: bool,
    /// What this request was charged. Zero on cache hits.
    pub cost_usd: f64,
    pub cached: bool,
    pub engagement: EngagementLevel,
    /// Spend avoided by the cache hit; absent on misses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_usd: Option<f64>,
}

impl WindfallExtension {
    /// Merge this extension into a completion body.
    pub fn attach(&self, completion: Value) -> Value {
        let mut map = match completion {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("response".to_string(), other);
                map
            }
        };
        map.insert(
            "windfall".to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }
}

// ===== 402 body =====

/// Per-method payment instructions included in the anonymous 402.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodsHint {
    pub x402: String,
    pub credits: String,
    pub manual: String,
}

impl Default for PaymentMethodsHint {
    fn default() -> Self {
        Self {
            x402: "Send request with PAYMENT-SIGNATURE header (base64 JSON). x402 clients handle this automatically.".to_string(),
            credits: "Add Authorization: Bearer wf_YOUR_KEY header. Get a key at POST /api/keys (25-100 free requests based on onchain identity)".to_string(),
            manual: "Add X-Wallet-Address and X-Payment-TX headers with a Base tx hash (ETH or USDC)".to_string(),
        }
    }
}

/// JSON body of a 402 response. One struct covers every denial shape;
/// fields a given denial does not use stay `None` and are omitted from
/// the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "x402Version")]
    pub x402_version: u8,
    pub price_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RoutingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<EngagementLevel>,
    /// Gateway wallet accepting direct transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(rename = "payTo", skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,
    pub network: String,
    #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_tier_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<PaymentMethodsHint>,
}

impl PaymentRequiredBody {
    /// Common fields for a direct-transfer denial; callers fill in the
    /// variant-specific ones.
    pub fn base(price_usd: f64, gateway_wallet: &str) -> Self {
        Self {
            error: "Payment required".to_string(),
            message: None,
            x402_version: 2,
            price_usd,
            model: None,
            mode: None,
            engagement: None,
            wallet: Some(gateway_wallet.to_string()),
            pay_to: None,
            network: "Base".to_string(),
            chain_id: Some(8453),
            accepts: Some(vec!["ETH".to_string(), "USDC".to_string()]),
            asset: None,
            free_tier_remaining: None,
            topup: None,
            hint: None,
            methods: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extension() -> WindfallExtension {
        WindfallExtension {
            node: "wf-helsinki".to_string(),
            location: "Helsinki, Finland".to_string(),
            mode: RoutingMode::Greenest,
            energy_price_per_kwh: 0.031,
            carbon_intensity_g_co2: 45.0,
            renewable_percent: 88.0,
            curtailment_active: true,
            cost_usd: 0.0022,
            cached: false,
            engagement: EngagementLevel::Warm,
            saved_usd: None,
        }
    }

    #[test]
    fn test_extension_wire_names() {
        let value = serde_json::to_value(extension()).unwrap();
        assert_eq!(value["energyPricePerKwh"], json!(0.031));
        assert_eq!(value["carbonIntensityGCO2"], json!(45.0));
        assert_eq!(value["curtailmentActive"], json!(true));
        assert_eq!(value["mode"], json!("greenest"));
        assert_eq!(value["engagement"], json!("warm"));
        assert!(value.get("savedUsd").is_none());
    }

    #[test]
    fn test_extension_saved_usd_present_when_set() {
        let mut ext = extension();
        ext.saved_usd = Some(0.0022);
        let value = serde_json::to_value(ext).unwrap();
        assert_eq!(value["savedUsd"], json!(0.0022));
    }

    #[test]
    fn test_attach_preserves_completion_fields() {
        let completion = json!({
            "id": "gen-1",
            "choices": [{"message": {"content": "hello"}}],
        });
        let merged = extension().attach(completion);
        assert_eq!(merged["id"], json!("gen-1"));
        assert_eq!(merged["windfall"]["node"], json!("wf-helsinki"));
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = GatewayResponse::ok(json!({})).with_header(HEADER_CACHE, "HIT");
        assert_eq!(response.header("x-windfall-cache"), Some("HIT"));
        assert_eq!(response.header("X-Missing"), None);
    }

    #[test]
    fn test_bad_request_body() {
        let response = GatewayResponse::bad_request("messages array is required");
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], json!("messages array is required"));
    }

    #[test]
    fn test_internal_error_carries_request_id() {
        let response = GatewayResponse::internal_error("abcd1234");
        assert_eq!(response.status, 500);
        assert_eq!(response.body["request_id"], json!("abcd1234"));
    }

    #[test]
    fn test_base_402_body_shape() {
        let body = PaymentRequiredBody::base(0.0022, "0x9fe4");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["error"], json!("Payment required"));
        assert_eq!(value["x402Version"], json!(2));
        assert_eq!(value["chainId"], json!(8453));
        assert_eq!(value["accepts"], json!(["ETH", "USDC"]));
        assert!(value.get("message").is_none());
        assert!(value.get("methods").is_none());
    }
}
