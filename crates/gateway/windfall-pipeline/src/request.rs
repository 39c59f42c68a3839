//! Inbound request envelope.

use rand::RngCore;
use windfall_types::{ChatRequest, RequestHeaders};

/// One inference request as handed to the pipeline by the transport
/// layer: parsed body, plucked headers, and the socket peer address
/// (used to authenticate forwarded-request markers).
#[derive(Debug, Clone, Default)]
pub struct GatewayRequest {
    pub body: ChatRequest,
    pub headers: RequestHeaders,
    pub client_ip: String,
}

impl GatewayRequest {
    pub fn new(body: ChatRequest) -> Self {
        Self {
            body,
            headers: RequestHeaders::default(),
            client_ip: String::new(),
        }
    }

    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }
}

/// Generate a request id: 16 random bytes, hex-encoded.
pub fn request_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
