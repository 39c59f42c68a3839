//! Engagement classification levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How engaged the caller looks, derived from request signals.
///
/// The level steers automatic model selection: hot conversations get
/// the premium tier, background traffic gets the economical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Hot,
    Warm,
    Cold,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Hot => "hot",
            EngagementLevel::Warm => "warm",
            EngagementLevel::Cold => "cold",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
