//! Credential extraction from request headers and body.
//!
//! The `Authorization` header is shared between two credential kinds:
//! bearer values starting with `wf_` are API keys, anything else is
//! treated as a session token. Wallet addresses can arrive in the body
//! or in either of two headers; the first well-formed one wins.

use windfall_types::{normalize_wallet, ChatRequest, RequestHeaders, API_KEY_PREFIX};

const BEARER_PREFIX: &str = "Bearer ";

/// Pull an API key out of the `Authorization` header.
///
/// Only `Bearer wf_...` values qualify; other bearer tokens belong to
/// [`extract_session_token`].
pub fn extract_api_key(headers: &RequestHeaders) -> Option<&str> {
    let auth = headers.authorization.as_deref()?;
    let token = auth.strip_prefix(BEARER_PREFIX)?;
    if token.starts_with(API_KEY_PREFIX) {
        Some(token)
    } else {
        None
    }
}

/// Pull a session token out of the `Authorization` header.
///
/// Any bearer value that is not an API key is a candidate session
/// token; whether it resolves to a live session is up to the session
/// store.
pub fn extract_session_token(headers: &RequestHeaders) -> Option<&str> {
    let auth = headers.authorization.as_deref()?;
    let token = auth.strip_prefix(BEARER_PREFIX)?;
    if token.starts_with(API_KEY_PREFIX) || token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve a wallet address from the request body or headers.
///
/// Precedence: body `x_wallet_address`, then `X-Wallet-Address`, then
/// `X-Payer-Address`. Malformed addresses are skipped rather than
/// rejected, so a typo falls back to the next source.
pub fn extract_wallet(body: &ChatRequest, headers: &RequestHeaders) -> Option<String> {
    body.x_wallet_address
        .as_deref()
        .and_then(normalize_wallet)
        .or_else(|| headers.wallet_address.as_deref().and_then(normalize_wallet))
        .or_else(|| headers.payer_address.as_deref().and_then(normalize_wallet))
}

/// The payment transaction hash for this request, body field first.
pub fn extract_payment_tx<'a>(body: &'a ChatRequest, headers: &'a RequestHeaders) -> Option<&'a str> {
    body.x_payment_tx
        .as_deref()
        .or(headers.payment_tx.as_deref())
        .filter(|tx| !tx.is_empty())
}
