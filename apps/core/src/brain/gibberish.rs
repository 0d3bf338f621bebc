//! Gibberish scoring.
//!
//! Sums weighted lexical signals (character runs, vowel balance, keyboard
//! mashing, filler words, unknown words, symbol noise) into a score capped at 1.0.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const REPEAT_RUN: usize = 5;
const MIN_LETTERS_FOR_VOWEL_CHECK: usize = 6;

const WEIGHT_REPEAT: f32 = 0.4;
const WEIGHT_VOWEL: f32 = 0.3;
const WEIGHT_KEYBOARD: f32 = 0.3;
const WEIGHT_JUNK_MANY: f32 = 0.5;
const WEIGHT_JUNK_ONE: f32 = 0.2;
const WEIGHT_UNKNOWN_WORDS: f32 = 0.3;
const WEIGHT_SYMBOLS: f32 = 0.2;

/// Filler words people type when poking at a chat box.
const JUNK_WORDS: &[&str] = &[
    "test", "testing", "tester", "random", "foo", "bar", "baz", "lorem", "ipsum", "blah",
    "dummy", "asdf", "qwerty", "xyz", "abc", "hello world", "sample",
];

/// Frequent English words; anything here counts as a real word.
const COMMON_WORDS: &[&str] = &[
    "a", "i", "am", "an", "as", "at", "be", "by", "do", "go", "he", "if", "in", "is", "it", "me",
    "my", "no", "of", "on", "or", "so", "to", "up", "us", "we", "all", "and", "any", "are",
    "buy", "can", "day", "did", "for", "get", "got", "had", "has", "her", "him", "his", "how",
    "its", "let", "may", "new", "not", "now", "off", "old", "one", "our", "out", "own", "pay",
    "put", "see", "she", "the", "too", "two", "use", "was", "way", "who", "why", "yes", "you",
    "also", "back", "been", "come", "does", "done", "each", "even", "find", "from", "give",
    "good", "have", "help", "here", "into", "just", "know", "like", "long", "look", "make",
    "many", "more", "most", "much", "must", "need", "only", "over", "some", "such", "take",
    "than", "that", "them", "then", "they", "this", "time", "very", "want", "well", "were",
    "what", "when", "will", "with", "work", "your", "about", "after", "could", "every",
    "first", "where", "which", "while", "would", "there", "these", "thing", "think", "those",
    "order", "price", "account", "should",
];

static KEYBOARD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(qwer|wert|erty|rtyu|tyui|yuio|uiop)").expect("Invalid regex: qwer row"),
        Regex::new(r"(?i)(asdf|sdfg|dfgh|fghj|ghjk|hjkl)").expect("Invalid regex: asdf row"),
        Regex::new(r"(?i)(zxcv|xcvb|cvbn|vbnm)").expect("Invalid regex: zxcv row"),
        Regex::new(r"\d{6,}").expect("Invalid regex: digit run"),
    ]
});

static COMMON_WORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| COMMON_WORDS.iter().copied().collect());

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// True if some character repeats `REPEAT_RUN` or more times in a row.
pub fn has_repeated_run(text: &str) -> bool {
    let mut previous = None;
    let mut run = 0usize;
    for c in text.chars() {
        if Some(c) == previous {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run >= REPEAT_RUN {
            return true;
        }
    }
    false
}

/// Share of vowels among letters, or `None` when there are too few letters to judge.
fn vowel_ratio(text: &str) -> Option<f32> {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < MIN_LETTERS_FOR_VOWEL_CHECK {
        return None;
    }
    let vowels = letters.iter().filter(|c| is_vowel(**c)).count();
    Some(vowels as f32 / letters.len() as f32)
}

fn looks_like_word(word: &str) -> bool {
    COMMON_WORD_SET.contains(word) || (word.chars().count() >= 4 && word.chars().any(is_vowel))
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Gibberish score in [0.0, 1.0]. Higher means less likely to be a real question.
pub fn gibberish_score(text: &str) -> f32 {
    let mut score = 0.0f32;

    if has_repeated_run(text) {
        score += WEIGHT_REPEAT;
    }

    if let Some(ratio) = vowel_ratio(text) {
        if !(0.15..=0.7).contains(&ratio) {
            score += WEIGHT_VOWEL;
        }
    }

    let keyboard_hits = KEYBOARD_PATTERNS.iter().filter(|p| p.is_match(text)).count();
    score += keyboard_hits as f32 * WEIGHT_KEYBOARD;

    let tokens = words(text);
    let lowered = text.to_lowercase();
    let junk_hits = JUNK_WORDS
        .iter()
        .filter(|junk| {
            if junk.contains(' ') {
                lowered.contains(*junk)
            } else {
                tokens.iter().any(|t| t == *junk)
            }
        })
        .count();
    if junk_hits >= 2 {
        score += WEIGHT_JUNK_MANY;
    } else if junk_hits == 1 {
        score += WEIGHT_JUNK_ONE;
    }

    let alphabetic: Vec<&String> = tokens
        .iter()
        .filter(|t| t.chars().all(|c| c.is_alphabetic()))
        .collect();
    if !alphabetic.is_empty() {
        let real = alphabetic.iter().filter(|w| looks_like_word(w)).count();
        if (real as f32 / alphabetic.len() as f32) < 0.3 {
            score += WEIGHT_UNKNOWN_WORDS;
        }
    }

    let total = text.chars().count();
    if total > 0 {
        let symbols = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation())
            .count();
        if symbols as f32 / total as f32 > 0.3 {
            score += WEIGHT_SYMBOLS;
        }
    }

    score.min(1.0)
}
