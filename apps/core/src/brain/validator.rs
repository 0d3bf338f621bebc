//! Question validation pipeline.
//!
//! Decides whether a question is worth keeping as a knowledge gap. Stages run
//! in order and the first failing stage decides the reason:
//! length → word count → gibberish → spam → quality factors → question form.

use crate::brain::gibberish::gibberish_score;
use crate::brain::quality::quality_score;
use crate::brain::spam::detect_spam;
use crate::config::AssistConfig;
use crate::models::{ValidationReason, ValidationResult};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

const TOO_FEW_WORDS_QUALITY: f32 = 0.1;
const GIBBERISH_PENALTY: f32 = 0.3;
const SUSPICIOUS_PENALTY: f32 = 0.2;
const NOT_QUESTION_PENALTY: f32 = 0.2;

/// Per-call overrides of the configured toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    pub check_gibberish: Option<bool>,
    pub check_spam: Option<bool>,
    pub min_quality_score: Option<f32>,
}

/// Pure, deterministic validator built from the configured thresholds.
#[derive(Debug, Clone)]
pub struct QuestionValidator {
    min_length: usize,
    max_length: usize,
    min_words: usize,
    gibberish_cutoff: f32,
    min_quality_score: f32,
    check_gibberish: bool,
    check_spam: bool,
}

impl Default for QuestionValidator {
    fn default() -> Self {
        Self::new(&AssistConfig::default())
    }
}

impl QuestionValidator {
    pub fn new(config: &AssistConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            min_words: config.min_words,
            gibberish_cutoff: config.gibberish_cutoff,
            min_quality_score: config.min_quality_score,
            check_gibberish: config.check_gibberish,
            check_spam: config.check_spam,
        }
    }

    /// Validate a question. Rejections are returned as values, never errors.
    pub fn validate(
        &self,
        question: &str,
        faq_confidence: f32,
        options: &ValidateOptions,
    ) -> ValidationResult {
        let text = question.trim();
        let mut flags = BTreeSet::new();
        if faq_confidence > 0.0 {
            flags.insert("partial_match".to_string());
        }

        // 1. Length
        let length = text.chars().count();
        if length < self.min_length {
            return ValidationResult::reject(ValidationReason::TooShort, 0.0, flags);
        }
        if length > self.max_length {
            return ValidationResult::reject(ValidationReason::TooLong, 0.0, flags);
        }

        // 2. Word count (total and distinct)
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let distinct: HashSet<&str> = words.iter().map(String::as_str).collect();
        if words.len() < self.min_words || distinct.len() < self.min_words {
            return ValidationResult::reject(
                ValidationReason::TooFewWords,
                TOO_FEW_WORDS_QUALITY,
                flags,
            );
        }

        let mut quality = 1.0f32;

        // 3. Gibberish
        if options.check_gibberish.unwrap_or(self.check_gibberish) {
            let gibberish = gibberish_score(text);
            if gibberish > self.gibberish_cutoff {
                flags.insert("gibberish".to_string());
                return ValidationResult::reject(
                    ValidationReason::Gibberish,
                    (1.0 - gibberish).max(0.0),
                    flags,
                );
            }
            quality -= gibberish * GIBBERISH_PENALTY;
        }

        // 4. Spam
        if options.check_spam.unwrap_or(self.check_spam) {
            let spam = detect_spam(text);
            if spam.is_spam {
                for category in &spam.matched {
                    flags.insert(format!("spam:{category}"));
                }
                return ValidationResult::reject(ValidationReason::Spam, 0.0, flags);
            }
            if spam.is_suspicious() {
                flags.insert("suspicious".to_string());
                for category in &spam.matched {
                    flags.insert(format!("spam:{category}"));
                }
                quality -= SUSPICIOUS_PENALTY;
            }
        }

        // 5. Quality factors
        let report = quality_score(text);
        quality = quality.min(report.score);

        // 6. Question form
        if !report.is_question {
            quality -= NOT_QUESTION_PENALTY;
            flags.insert("not_question".to_string());
        }
        let quality = quality.clamp(0.0, 1.0);

        // 7. Final threshold
        let min_quality = options.min_quality_score.unwrap_or(self.min_quality_score);
        if quality < min_quality {
            debug!(quality, min_quality, "Question rejected as low quality");
            return ValidationResult::reject(ValidationReason::LowQuality, quality, flags);
        }

        ValidationResult {
            is_valid: true,
            reason: ValidationReason::Valid,
            quality_score: quality,
            flags,
        }
    }
}
