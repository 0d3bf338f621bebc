//! Topic extraction.
//!
//! Reduces a piece of conversation to a handful of content words by stripping
//! punctuation, stopwords and very short tokens.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum number of words kept in a topic.
pub const MAX_TOPIC_WORDS: usize = 5;

/// Tokens of this length or shorter never make it into a topic.
const MIN_TOKEN_LEN: usize = 2;

/// English stopwords removed before topic extraction.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "when", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "once", "here", "there", "where", "why", "how", "all", "any", "both",
    "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
    "same", "so", "than", "too", "very", "can", "will", "just", "should", "now", "what",
    "which", "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were",
    "be", "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing",
    "would", "could", "you", "your", "yours", "our", "ours", "they", "them", "their", "its",
    "it", "he", "she", "his", "her", "me", "my", "we", "us", "also", "please", "thanks",
    "thank", "yes", "okay", "know", "tell", "want", "need", "get", "like",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// True if `word` (already lowercased) is in the stopword list.
pub fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Lowercases and removes everything but letters, digits, underscores and whitespace.
pub fn strip_punctuation(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}

/// Returns up to five distinct content words of `text`, in first-seen order,
/// joined by single spaces. Empty input yields an empty topic.
pub fn extract_topic(text: &str) -> String {
    let cleaned = strip_punctuation(text);
    let mut seen = HashSet::new();

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() > MIN_TOKEN_LEN && !is_stopword(word))
        .filter(|word| seen.insert(*word))
        .take(MAX_TOPIC_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}
