//! Cache key derivation.

use serde::Serialize;
use sha2::{Digest, Sha256};
use windfall_types::ChatMessage;

/// Shape hashed into the key. Field order matters: it is part of the
/// serialized form and therefore of the key itself.
#[derive(Serialize)]
struct NormalizedMessage<'a> {
    role: String,
    content: &'a str,
}

/// Canonical JSON for a message list.
///
/// Role casing and surrounding whitespace carry no meaning, so
/// `" User "` and `"user"` normalize to the same form.
pub fn normalize_messages(messages: &[ChatMessage]) -> serde_json::Result<String> {
    let normalized: Vec<NormalizedMessage<'_>> = messages
        .iter()
        .map(|message| NormalizedMessage {
            role: message.role.to_lowercase().trim().to_string(),
            content: message.content.trim(),
        })
        .collect();
    serde_json::to_string(&normalized)
}

/// Key for a (messages, model, caller scope) triple.
///
/// The scope keeps entries private to one identity; see
/// [`CallerIdentity::cache_scope`](windfall_types::CallerIdentity::cache_scope).
pub fn cache_key(
    messages: &[ChatMessage],
    model: &str,
    scope: &str,
) -> serde_json::Result<String> {
    let normalized = normalize_messages(messages)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"|");
    hasher.update(model.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(scope.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// True when the request's Cache-Control header opts out of caching.
pub fn should_bypass(cache_control: Option<&str>) -> bool {
    cache_control.map_or(false, |value| {
        value.contains("no-cache") || value.contains("no-store")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_whitespace_and_role_case() {
        let messages = vec![
            ChatMessage::new(" User ", "  What is the spot price?  "),
            ChatMessage::new("ASSISTANT", "Depends on the zone."),
        ];
        let normalized = normalize_messages(&messages).unwrap();
        assert_eq!(
            normalized,
            r#"[{"role":"user","content":"What is the spot price?"},{"role":"assistant","content":"Depends on the zone."}]"#
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let messages = vec![ChatMessage::user("hello")];
        let a = cache_key(&messages, "gpt-4", "wallet:0xabc").unwrap();
        let b = cache_key(&messages, "gpt-4", "wallet:0xabc").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_ignores_model_case() {
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(
            cache_key(&messages, "GPT-4", "s").unwrap(),
            cache_key(&messages, "gpt-4", "s").unwrap()
        );
    }

    #[test]
    fn test_key_varies_by_scope_and_model() {
        let messages = vec![ChatMessage::user("hello")];
        let base = cache_key(&messages, "gpt-4", "wallet:0xabc").unwrap();
        assert_ne!(base, cache_key(&messages, "gpt-4", "wallet:0xdef").unwrap());
        assert_ne!(base, cache_key(&messages, "claude-3", "wallet:0xabc").unwrap());
    }

    #[test]
    fn test_bypass_directives() {
        assert!(should_bypass(Some("no-cache")));
        assert!(should_bypass(Some("no-store, max-age=0")));
        assert!(!should_bypass(Some("max-age=60")));
        assert!(!should_bypass(None));
    }
}
