//! Engagement classification for the Windfall gateway.
//!
//! Interactive traffic and background batch traffic deserve different
//! models. The classifier scores each request 0 to 100 from cheap
//! signals (conversation shape, request cadence, prompt size, an
//! explicit priority header, time of day) and buckets it:
//!
//! ```text
//!   score >= 65  hot    someone is waiting on this answer
//!   score >= 35  warm   interactive but not urgent
//!   otherwise    cold   background or automated traffic
//! ```
//!
//! When the caller does not pin a model, the bucket picks one from
//! [`ModelTiers`] and the response reports the estimated savings
//! against a premium model.

pub mod score;
pub mod tiers;

pub use score::{Classification, ClassifyInput, EngagementClassifier, EngagementProfile};
pub use tiers::ModelTiers;
