//! Semantic response cache for the Windfall gateway.
//!
//! Two requests that mean the same thing should cost one inference.
//! Prompts are normalized (whitespace and role casing stripped) and
//! hashed together with the model and a caller scope, so a cache entry
//! is only ever visible to the identity that created it:
//!
//! ```text
//!   messages ──> normalize ──┐
//!   model ───────────────────┼──> SHA-256 ──> cache key ──> SQLite row
//!   caller scope ────────────┘
//! ```
//!
//! Entries expire on a TTL and keep a running total of the inference
//! spend they saved, which the gateway reports back to callers.

pub mod cache;
pub mod key;

pub use cache::{CacheHit, SemanticCache, DEFAULT_TTL};
pub use key::{cache_key, normalize_messages, should_bypass};
