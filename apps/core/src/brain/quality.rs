//! Factor-based question quality scoring.

use serde::{Deserialize, Serialize};

const BASE_SCORE: f32 = 0.5;

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does", "will",
];

const INTENT_KEYWORDS: &[&str] = &[
    "help", "need", "explain", "problem", "issue", "error", "want", "trying", "looking",
    "question", "understand", "know", "find", "work", "fix", "support",
];

/// Outcome of quality scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score in [0.0, 1.0].
    pub score: f32,
    /// Ends with `?` or starts with a question word.
    pub is_question: bool,
}

/// Scores how much `text` reads like a genuine, answerable question.
pub fn quality_score(text: &str) -> QualityReport {
    let trimmed = text.trim();
    let words: Vec<String> = trimmed
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let mut score = BASE_SCORE;

    let ends_with_question_mark = trimmed.ends_with('?');
    if ends_with_question_mark {
        score += 0.1;
    }

    let starts_with_question_word = words
        .first()
        .is_some_and(|w| QUESTION_WORDS.contains(&w.as_str()));
    if starts_with_question_word {
        score += 0.1;
    }

    if trimmed.chars().next().is_some_and(|c| c.is_uppercase()) {
        score += 0.05;
    }

    if !words.is_empty() {
        let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
        let avg = total_len as f32 / words.len() as f32;
        if (3.0..=10.0).contains(&avg) {
            score += 0.1;
        }
    }

    if (5..=30).contains(&words.len()) {
        score += 0.1;
    }

    if words.iter().any(|w| INTENT_KEYWORDS.contains(&w.as_str())) {
        score += 0.05;
    }

    QualityReport {
        score: score.clamp(0.0, 1.0),
        is_question: ends_with_question_mark || starts_with_question_word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_question() {
        let report = quality_score("What are your store hours on Sundays?");
        assert!(report.is_question);
        assert!((report.score - 0.95).abs() < 1e-5, "score was {}", report.score);
    }

    #[test]
    fn test_statement() {
        let report = quality_score("my parcel never arrived yesterday");
        assert!(!report.is_question);
        assert!((report.score - 0.7).abs() < 1e-5, "score was {}", report.score);
    }

    #[test]
    fn test_question_mark_only() {
        let report = quality_score("shipping to canada?");
        assert!(report.is_question);
    }

    #[test]
    fn test_intent_keyword_bonus() {
        let with = quality_score("I need a refund for order 12");
        let without = quality_score("I got a refund for order 12");
        assert!(with.score > without.score);
    }

    #[test]
    fn test_empty() {
        let report = quality_score("");
        assert!(!report.is_question);
        assert!((report.score - BASE_SCORE).abs() < 1e-6);
    }
}
