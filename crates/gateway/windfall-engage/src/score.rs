//! The engagement scoring model.
//!
//! Every signal is cheap: nothing here reads the prompt beyond its
//! length, and the only state is a short per-caller timestamp history
//! for cadence detection.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;
use windfall_types::{ChatMessage, EngagementLevel};

use crate::tiers::ModelTiers;

const BASE_SCORE: i32 = 50;
const HOT_THRESHOLD: i32 = 65;
const WARM_THRESHOLD: i32 = 35;
/// Timestamps kept per caller for cadence detection.
const MAX_HISTORY: usize = 20;

/// Everything the classifier looks at for one request.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub messages: &'a [ChatMessage],
    /// Raw `X-Priority` header value, if the caller sent one.
    pub priority: Option<&'a str>,
    /// Model the caller pinned; `None` means auto-select.
    pub requested_model: Option<&'a str>,
    /// Stable identity key for cadence history. API key id or wallet
    /// address when known, otherwise the request id.
    pub caller_key: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub level: EngagementLevel,
    pub score: u8,
    /// Human-readable reasons behind the score.
    pub signals: Vec<String>,
    /// Model the request should run on.
    pub auto_model: String,
    /// Savings versus the premium model; `None` when the caller pinned
    /// a model and no substitution happened.
    pub estimated_savings_percent: Option<u32>,
}

/// Cadence summary for one caller, derived from the same history the
/// classifier keeps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementProfile {
    pub requests_last_hour: usize,
    pub score: u8,
}

pub struct EngagementClassifier {
    tiers: ModelTiers,
    history: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl EngagementClassifier {
    pub fn new(tiers: ModelTiers) -> Self {
        Self {
            tiers,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Classifies against the current wall clock.
    pub fn classify(&self, input: ClassifyInput<'_>) -> Classification {
        let now = now_ms();
        self.classify_at(input, now, utc_hour(now))
    }

    /// Classifies at an explicit time. `utc_hour` is 0 to 23.
    pub fn classify_at(
        &self,
        input: ClassifyInput<'_>,
        now_ms: u64,
        utc_hour: u32,
    ) -> Classification {
        let mut score = BASE_SCORE;
        let mut signals = Vec::new();

        if let Some(priority) = input.priority {
            match priority.to_lowercase().as_str() {
                "high" | "hot" => {
                    score += 40;
                    signals.push("explicit priority: high".to_string());
                }
                "low" | "cold" => {
                    score -= 40;
                    signals.push("explicit priority: low".to_string());
                }
                "medium" | "warm" => {
                    signals.push("explicit priority: medium".to_string());
                }
                _ => {}
            }
        }

        let count = input.messages.len();
        if count >= 6 {
            score += 15;
            signals.push(format!("multi-turn conversation ({count} messages)"));
        } else if count >= 3 {
            score += 5;
            signals.push(format!("moderate conversation ({count} messages)"));
        } else if count == 1 {
            score -= 10;
            signals.push("single message (likely background task)".to_string());
        }

        if let Some(gap) = self.record_request(input.caller_key, now_ms) {
            if gap < 10_000 {
                score += 20;
                signals.push("rapid fire (<10s gap)".to_string());
            } else if gap < 60_000 {
                score += 10;
                signals.push("active conversation (<1m gap)".to_string());
            } else if gap > 300_000 {
                score -= 10;
                signals.push("infrequent (>5m gap)".to_string());
            }
        }

        let system_len = input
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map_or(0, |m| m.content.len());
        if system_len > 2000 {
            score += 5;
            signals.push("complex system prompt".to_string());
        }

        let user_len = input
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map_or(0, |m| m.content.len());
        if user_len > 0 && user_len < 20 {
            score -= 10;
            signals.push("very short prompt".to_string());
        } else if user_len > 500 {
            score += 5;
            signals.push("detailed prompt".to_string());
        }

        if (2..=6).contains(&utc_hour) {
            score -= 10;
            signals.push("off-peak hours (UTC 02-06)".to_string());
        }

        let score = score.clamp(0, 100);
        let level = level_for(score);
        let (auto_model, estimated_savings_percent) = match input.requested_model {
            Some(model) => (model.to_string(), None),
            None => (
                self.tiers.model_for(level).to_string(),
                Some(self.tiers.savings_percent()),
            ),
        };

        debug!(
            caller = %input.caller_key,
            score,
            level = %level,
            model = %auto_model,
            "engagement classified"
        );
        Classification {
            level,
            score: score as u8,
            signals,
            auto_model,
            estimated_savings_percent,
        }
    }

    /// Cadence profile for one caller at the current wall clock.
    pub fn profile(&self, caller_key: &str) -> EngagementProfile {
        self.profile_at(caller_key, now_ms())
    }

    pub fn profile_at(&self, caller_key: &str, now_ms: u64) -> EngagementProfile {
        let history = self.lock_history();
        let hour_ago = now_ms.saturating_sub(3_600_000);
        let requests_last_hour = history
            .get(caller_key)
            .map_or(0, |t| t.iter().filter(|ts| **ts >= hour_ago).count());
        let score = if requests_last_hour > 20 {
            80
        } else if requests_last_hour > 5 {
            60
        } else if requests_last_hour < 2 {
            30
        } else {
            50
        };
        EngagementProfile {
            requests_last_hour,
            score,
        }
    }

    /// Appends a timestamp and returns the gap to the previous request,
    /// if there was one.
    fn record_request(&self, caller_key: &str, now_ms: u64) -> Option<u64> {
        let mut history = self.lock_history();
        let timestamps = history.entry(caller_key.to_string()).or_default();
        timestamps.push_back(now_ms);
        while timestamps.len() > MAX_HISTORY {
            timestamps.pop_front();
        }
        if timestamps.len() >= 2 {
            let previous = timestamps[timestamps.len() - 2];
            Some(now_ms.saturating_sub(previous))
        } else {
            None
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<u64>>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn level_for(score: i32) -> EngagementLevel {
    if score >= HOT_THRESHOLD {
        EngagementLevel::Hot
    } else if score >= WARM_THRESHOLD {
        EngagementLevel::Warm
    } else {
        EngagementLevel::Cold
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn utc_hour(now_ms: u64) -> u32 {
    ((now_ms / 3_600_000) % 24) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOON: u32 = 12;

    fn classifier() -> EngagementClassifier {
        EngagementClassifier::new(ModelTiers::default())
    }

    fn input<'a>(messages: &'a [ChatMessage]) -> ClassifyInput<'a> {
        ClassifyInput {
            messages,
            priority: None,
            requested_model: None,
            caller_key: "0xabc",
        }
    }

    #[test]
    fn test_single_message_is_warm() {
        let messages = vec![ChatMessage::user("tell me about energy markets")];
        let c = classifier().classify_at(input(&messages), 1_000_000, NOON);

        assert_eq!(c.score, 40);
        assert_eq!(c.level, EngagementLevel::Warm);
        assert!(c
            .signals
            .contains(&"single message (likely background task)".to_string()));
    }

    #[test]
    fn test_priority_header_dominates() {
        let messages = vec![ChatMessage::user("tell me about energy markets")];

        let mut high = input(&messages);
        high.priority = Some("HIGH");
        let c = classifier().classify_at(high, 1_000_000, NOON);
        assert_eq!(c.score, 80);
        assert_eq!(c.level, EngagementLevel::Hot);
        assert!(c.signals.contains(&"explicit priority: high".to_string()));

        let mut low = input(&messages);
        low.priority = Some("cold");
        let c = classifier().classify_at(low, 1_000_000, NOON);
        assert_eq!(c.score, 0);
        assert_eq!(c.level, EngagementLevel::Cold);
        assert!(c.signals.contains(&"explicit priority: low".to_string()));
    }

    #[test]
    fn test_medium_priority_is_signal_only() {
        let messages = vec![ChatMessage::user("tell me about energy markets")];
        let mut medium = input(&messages);
        medium.priority = Some("medium");
        let c = classifier().classify_at(medium, 1_000_000, NOON);

        assert_eq!(c.score, 40);
        assert!(c.signals.contains(&"explicit priority: medium".to_string()));
    }

    #[test]
    fn test_multi_turn_conversation_is_hot() {
        let mut messages = Vec::new();
        for i in 0..3 {
            messages.push(ChatMessage::user(format!("question number {i} about grids")));
            messages.push(ChatMessage::new("assistant", "an answer"));
        }
        let c = classifier().classify_at(input(&messages), 1_000_000, NOON);

        assert_eq!(c.score, 65);
        assert_eq!(c.level, EngagementLevel::Hot);
        assert!(c
            .signals
            .contains(&"multi-turn conversation (6 messages)".to_string()));
    }

    #[test]
    fn test_moderate_conversation_bonus() {
        let messages = vec![
            ChatMessage::user("first question about energy"),
            ChatMessage::new("assistant", "an answer"),
            ChatMessage::user("a quick follow-up question"),
        ];
        let c = classifier().classify_at(input(&messages), 1_000_000, NOON);

        assert_eq!(c.score, 55);
        assert!(c
            .signals
            .contains(&"moderate conversation (3 messages)".to_string()));
    }

    #[test]
    fn test_rapid_fire_cadence() {
        let clf = classifier();
        let messages = vec![ChatMessage::user("tell me about energy markets")];

        clf.classify_at(input(&messages), 1_000_000, NOON);
        let c = clf.classify_at(input(&messages), 1_005_000, NOON);

        assert_eq!(c.score, 60);
        assert!(c.signals.contains(&"rapid fire (<10s gap)".to_string()));
    }

    #[test]
    fn test_active_and_infrequent_cadence() {
        let clf = classifier();
        let messages = vec![ChatMessage::user("tell me about energy markets")];

        clf.classify_at(input(&messages), 1_000_000, NOON);
        let c = clf.classify_at(input(&messages), 1_030_000, NOON);
        assert!(c.signals.contains(&"active conversation (<1m gap)".to_string()));

        let c = clf.classify_at(input(&messages), 2_000_000, NOON);
        assert!(c.signals.contains(&"infrequent (>5m gap)".to_string()));
    }

    #[test]
    fn test_cadence_is_per_caller() {
        let clf = classifier();
        let messages = vec![ChatMessage::user("tell me about energy markets")];

        clf.classify_at(input(&messages), 1_000_000, NOON);
        let mut other = input(&messages);
        other.caller_key = "0xdef";
        let c = clf.classify_at(other, 1_005_000, NOON);

        assert!(!c.signals.contains(&"rapid fire (<10s gap)".to_string()));
    }

    #[test]
    fn test_prompt_length_signals() {
        let c = classifier().classify_at(
            input(&[ChatMessage::user("hi")]),
            1_000_000,
            NOON,
        );
        assert_eq!(c.score, 30);
        assert_eq!(c.level, EngagementLevel::Cold);
        assert!(c.signals.contains(&"very short prompt".to_string()));

        let long = "x".repeat(501);
        let c = classifier().classify_at(input(&[ChatMessage::user(long)]), 1_000_000, NOON);
        assert_eq!(c.score, 45);
        assert!(c.signals.contains(&"detailed prompt".to_string()));
    }

    #[test]
    fn test_complex_system_prompt() {
        let messages = vec![
            ChatMessage::system("x".repeat(2001)),
            ChatMessage::user("tell me about energy markets"),
        ];
        let c = classifier().classify_at(input(&messages), 1_000_000, NOON);
        assert!(c.signals.contains(&"complex system prompt".to_string()));
    }

    #[test]
    fn test_off_peak_hours() {
        let messages = vec![ChatMessage::user("tell me about energy markets")];
        let c = classifier().classify_at(input(&messages), 1_000_000, 3);
        assert_eq!(c.score, 30);
        assert!(c.signals.contains(&"off-peak hours (UTC 02-06)".to_string()));

        let c = classifier().classify_at(input(&messages), 1_000_000, 7);
        assert_eq!(c.score, 40);
    }

    #[test]
    fn test_score_clamped_to_100() {
        let clf = classifier();
        let mut messages = Vec::new();
        for i in 0..3 {
            messages.push(ChatMessage::user(format!("question {i}: {}", "y".repeat(600))));
            messages.push(ChatMessage::new("assistant", "an answer"));
        }
        let mut boosted = input(&messages);
        boosted.priority = Some("high");

        clf.classify_at(boosted, 1_000_000, NOON);
        let c = clf.classify_at(boosted, 1_001_000, NOON);
        assert_eq!(c.score, 100);
    }

    #[test]
    fn test_model_auto_selection_and_savings() {
        let messages = vec![ChatMessage::user("tell me about energy markets")];
        let c = classifier().classify_at(input(&messages), 1_000_000, NOON);
        assert_eq!(c.auto_model, "deepseek/deepseek-chat-v3-0324");
        assert_eq!(c.estimated_savings_percent, Some(91));

        let mut pinned = input(&messages);
        pinned.requested_model = Some("openai/gpt-4o");
        let c = classifier().classify_at(pinned, 1_000_000, NOON);
        assert_eq!(c.auto_model, "openai/gpt-4o");
        assert_eq!(c.estimated_savings_percent, None);
    }

    #[test]
    fn test_profile_thresholds() {
        let clf = classifier();
        let messages = vec![ChatMessage::user("tell me about energy markets")];

        assert_eq!(clf.profile_at("0xabc", 10_000_000).score, 30);

        for i in 0..10 {
            clf.classify_at(input(&messages), 10_000_000 + i * 1_000, NOON);
        }
        let profile = clf.profile_at("0xabc", 10_010_000);
        assert_eq!(profile.requests_last_hour, 10);
        assert_eq!(profile.score, 60);
    }

    #[test]
    fn test_history_is_capped() {
        let clf = classifier();
        let messages = vec![ChatMessage::user("tell me about energy markets")];
        for i in 0..30 {
            clf.classify_at(input(&messages), 10_000_000 + i * 1_000, NOON);
        }
        assert_eq!(clf.profile_at("0xabc", 10_030_000).requests_last_hour, 20);
    }
}
