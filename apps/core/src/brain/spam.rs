//! Spam detection using named pattern categories.
//!
//! A question is spam when it hits one of the definite categories
//! (profanity, threats, promo, url). Other categories only mark it suspicious.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Categories that reject a question outright.
pub const DEFINITE_SPAM: &[&str] = &["profanity", "threats", "promo", "url"];

const ALL_CAPS_MIN_LEN: usize = 20;

struct SpamPattern {
    category: &'static str,
    pattern: Regex,
}

static SPAM_PATTERNS: LazyLock<Vec<SpamPattern>> = LazyLock::new(|| {
    vec![
        SpamPattern {
            category: "url",
            pattern: Regex::new(r"(?i)(https?://\S+|\bwww\.\S+)").expect("Invalid regex: url"),
        },
        SpamPattern {
            category: "link_text",
            pattern: Regex::new(r"(?i)(click here|visit my (site|website|page)|check out my|<a\s+href|\[url)")
                .expect("Invalid regex: link text"),
        },
        SpamPattern {
            category: "email_spam",
            pattern: Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")
                .expect("Invalid regex: email"),
        },
        SpamPattern {
            category: "phone_spam",
            pattern: Regex::new(r"\+?\d[\d\s().-]{8,}\d").expect("Invalid regex: phone"),
        },
        SpamPattern {
            category: "promo",
            pattern: Regex::new(r"(?i)\b(buy now|free money|make money|earn \$?\d+|casino|viagra|cialis|crypto giveaway|forex signals|seo services|backlinks|limited time offer|work from home|100% free)\b")
                .expect("Invalid regex: promo"),
        },
        SpamPattern {
            category: "profanity",
            pattern: Regex::new(r"(?i)\b(fuck\w*|shit\w*|bitch\w*|asshole\w*|bastard\w*|cunt\w*|dickhead\w*|motherf\w*)")
                .expect("Invalid regex: profanity"),
        },
        SpamPattern {
            category: "threats",
            pattern: Regex::new(r"(?i)\b(i will kill|kill you|hurt you|bomb (you|your|the)|burn (it|you) down|hack (you|your))\b")
                .expect("Invalid regex: threats"),
        },
        SpamPattern {
            category: "test",
            pattern: Regex::new(r"(?i)^\s*(test(ing)?|hello|hi|hey|ping|asdf|[.?!]+)(\s+(test(ing)?|\d+))*\s*[.!?]*\s*$")
                .expect("Invalid regex: test message"),
        },
    ]
});

/// Result of spam detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamResult {
    /// True when a definite category matched.
    pub is_spam: bool,
    /// Every category that matched, in detection order.
    #[serde(borrow)]
    pub matched: Vec<&'static str>,
}

impl SpamResult {
    /// True when something matched that is not definite spam.
    pub fn is_suspicious(&self) -> bool {
        !self.matched.is_empty()
    }
}

/// Same word three times in a row, case-insensitive.
fn has_triple_repeat(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    words
        .windows(3)
        .any(|w| w[0] == w[1] && w[1] == w[2])
}

fn is_all_caps(text: &str) -> bool {
    text.chars().count() >= ALL_CAPS_MIN_LEN
        && text.chars().any(|c| c.is_alphabetic())
        && text
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase())
}

/// Runs every spam category against `text`.
pub fn detect_spam(text: &str) -> SpamResult {
    let mut matched: Vec<&'static str> = SPAM_PATTERNS
        .iter()
        .filter(|p| p.pattern.is_match(text))
        .map(|p| p.category)
        .collect();

    if has_triple_repeat(text) {
        matched.push("repetitive");
    }
    if is_all_caps(text) {
        matched.push("all_caps");
    }

    let is_spam = matched.iter().any(|c| DEFINITE_SPAM.contains(c));
    SpamResult { is_spam, matched }
}
