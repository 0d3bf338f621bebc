//! Follow-up detection using regex patterns.
//!
//! Decides whether a query only makes sense with the previous turns of the
//! conversation. Rules are evaluated in a fixed order and the first match wins.

use crate::models::{FollowupReason, FollowupResult};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Pronoun references only count on short queries.
const MAX_PRONOUN_WORDS: usize = 8;

/// Queries up to this many words are treated as fragments of a conversation.
const MAX_SHORT_WORDS: usize = 3;

// NOTE: expect() on literal patterns cannot fail at runtime once tests pass.
static PRONOUN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(them|they|it|that|those|these|this|he|she|his|her|their)\b")
        .expect("Invalid regex: pronoun pattern")
});

static FOLLOWUP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(can|could|would) you (tell|explain|show|give|elaborate|clarify|expand|repeat|describe|compare|list|send|say)\b")
            .expect("Invalid regex: can-you lead-in"),
        Regex::new(r"^(and|but|so|also)\b").expect("Invalid regex: conjunction lead-in"),
        Regex::new(r"^(yes|no|yeah|yep|nope|okay|ok|sure|alright)[\s.!?]*$")
            .expect("Invalid regex: acknowledgement"),
        Regex::new(r"^(more|another|other|else)\b").expect("Invalid regex: more/another lead-in"),
        Regex::new(r"\bmore (info|information|details|about)\b").expect("Invalid regex: more info"),
        Regex::new(r"^(what|how) about\b").expect("Invalid regex: what about"),
        Regex::new(r"\btell me more\b").expect("Invalid regex: tell me more"),
        Regex::new(r"^(why|how)[\s.!?]*$").expect("Invalid regex: bare why/how"),
        Regex::new(r"^which one\b").expect("Invalid regex: which one"),
        Regex::new(r"^(the|a) (first|second|third|last|best|cheapest|other|next|previous)\b")
            .expect("Invalid regex: ordinal reference"),
    ]
});

static GREETING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(hi|hello|hey|hiya|howdy|greetings|thanks|thank you|thx|cheers|bye|goodbye|see you|good (morning|afternoon|evening|night))\b")
        .expect("Invalid regex: greeting pattern")
});

static STANDALONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^what (is|are)\b").expect("Invalid regex: what is"),
        Regex::new(r"^how (do|does|can|much|many)\b").expect("Invalid regex: how do"),
        Regex::new(r"^where (is|are|do|can)\b").expect("Invalid regex: where is"),
        Regex::new(r"^who (is|are)\b").expect("Invalid regex: who is"),
    ]
});

/// Classifies raw queries as follow-up or standalone.
#[derive(Debug, Default, Clone, Copy)]
pub struct FollowupDetector;

impl FollowupDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify a raw query. Pure and deterministic.
    pub fn detect(&self, query: &str) -> FollowupResult {
        let normalized = query.trim().to_lowercase();
        let word_count = normalized.split_whitespace().count();

        let reason = if word_count <= MAX_PRONOUN_WORDS && PRONOUN_PATTERN.is_match(&normalized) {
            FollowupReason::PronounReference
        } else if FOLLOWUP_PATTERNS.iter().any(|p| p.is_match(&normalized)) {
            FollowupReason::FollowupPhrase
        } else if word_count > 0
            && word_count <= MAX_SHORT_WORDS
            && !GREETING_PATTERN.is_match(&normalized)
            && !STANDALONE_PATTERNS.iter().any(|p| p.is_match(&normalized))
        {
            FollowupReason::ShortQuestion
        } else {
            FollowupReason::Standalone
        };

        debug!(words = word_count, %reason, "Follow-up detection");

        FollowupResult {
            is_followup: reason != FollowupReason::Standalone,
            reason,
        }
    }

    /// True if the query is a greeting or farewell.
    pub fn is_greeting(&self, query: &str) -> bool {
        GREETING_PATTERN.is_match(&query.trim().to_lowercase())
    }
}
