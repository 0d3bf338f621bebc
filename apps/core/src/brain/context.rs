//! Conversation context for follow-up questions.
//!
//! The chat log lives in the transient store as a flat list of user and bot
//! entries, newest last. It is converted into [`Exchange`] pairs here and
//! nowhere else.

use crate::brain::keywords::extract_topic;
use crate::error::Result;
use crate::models::{ChatEntry, ChatRole, ConversationContext, Exchange};
use crate::services::traits::TransientStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Entries read from the log (three user/bot pairs).
pub const HISTORY_WINDOW: usize = 6;
pub const MAX_PAIRS: usize = 3;

const ENRICH_CONTEXT_CHARS: usize = 100;
const ENRICH_CONTEXT_MIN_CHARS: usize = 10;
const CONTEXT_STRING_PAIRS: usize = 2;
const CONTEXT_QUESTION_CHARS: usize = 100;
const CONTEXT_ANSWER_CHARS: usize = 120;

fn history_key(session_id: &str) -> String {
    format!("chat_history_{}", session_id)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Pairs each user entry with the bot entry right after it. Unpaired entries
/// are dropped and only the newest `MAX_PAIRS` pairs are kept.
pub fn pair_entries(entries: &[ChatEntry]) -> Vec<Exchange> {
    let window = &entries[entries.len().saturating_sub(HISTORY_WINDOW)..];
    let mut pairs = Vec::with_capacity(MAX_PAIRS);

    let mut i = 0;
    while i < window.len() {
        match (window.get(i), window.get(i + 1)) {
            (Some(user), Some(bot)) if user.role == ChatRole::User && bot.role == ChatRole::Bot => {
                pairs.push(Exchange {
                    question: user.text.clone(),
                    answer: bot.text.clone(),
                });
                i += 2;
            }
            _ => i += 1,
        }
    }

    let excess = pairs.len().saturating_sub(MAX_PAIRS);
    pairs.drain(..excess);
    pairs
}

/// Builds a context from completed exchanges, oldest first.
pub fn build_context(history: Vec<Exchange>) -> ConversationContext {
    let Some(last) = history.last() else {
        return ConversationContext::default();
    };

    let combined = history
        .iter()
        .map(|e| format!("{} {}", e.question, e.answer))
        .collect::<Vec<_>>()
        .join(" ");

    ConversationContext {
        last_question: last.question.clone(),
        last_answer: last.answer.clone(),
        topic: extract_topic(&combined),
        history,
    }
}

/// Reads and writes the per-session chat log and turns it into search context.
pub struct ContextEnricher {
    store: Arc<dyn TransientStore>,
    history_ttl: Duration,
}

impl ContextEnricher {
    pub fn new(store: Arc<dyn TransientStore>, history_ttl: Duration) -> Self {
        Self { store, history_ttl }
    }

    async fn load_entries(&self, session_id: &str) -> Result<Vec<ChatEntry>> {
        let Some(raw) = self.store.get(&history_key(session_id)).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_value::<Vec<ChatEntry>>(raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(session_id, "Discarding unreadable chat history: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// The recent conversation for a session. Empty when there is no history.
    pub async fn get_context(&self, session_id: &str) -> Result<ConversationContext> {
        let entries = self.load_entries(session_id).await?;
        let context = build_context(pair_entries(&entries));
        debug!(
            session_id,
            pairs = context.history.len(),
            topic = %context.topic,
            "Conversation context loaded"
        );
        Ok(context)
    }

    /// Appends a completed exchange to the session log.
    pub async fn record_exchange(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        let mut entries = self.load_entries(session_id).await?;
        entries.push(ChatEntry::user(question));
        entries.push(ChatEntry::bot(answer));

        let excess = entries.len().saturating_sub(HISTORY_WINDOW);
        entries.drain(..excess);

        self.store
            .set(
                &history_key(session_id),
                serde_json::to_value(&entries)?,
                self.history_ttl,
            )
            .await
    }

    /// Forgets the session log (page or session reset).
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.store.delete(&history_key(session_id)).await
    }

    /// Rewrites a follow-up into a context-carrying search query. Returns the
    /// query untouched when there is no context.
    pub fn enrich(&self, query: &str, context: &ConversationContext) -> String {
        if context.is_empty() {
            return query.to_string();
        }

        let mut parts = Vec::with_capacity(3);
        if !context.topic.is_empty() {
            parts.push(format!("Topic: {}", context.topic));
        }
        parts.push(format!("Question: {}", query));
        if context.last_question.chars().count() > ENRICH_CONTEXT_MIN_CHARS {
            parts.push(format!(
                "Context: {}",
                truncate_chars(&context.last_question, ENRICH_CONTEXT_CHARS)
            ));
        }
        parts.join(". ")
    }

    /// Short rendering of the newest exchanges for the gap log, e.g.
    /// `Q1: ... | A1: ... | Q2: ... | A2: ...`.
    pub fn context_string(&self, context: &ConversationContext) -> String {
        let skip = context.history.len().saturating_sub(CONTEXT_STRING_PAIRS);
        context
            .history
            .iter()
            .skip(skip)
            .enumerate()
            .flat_map(|(i, exchange)| {
                let n = i + 1;
                [
                    format!("Q{}: {}", n, truncate_chars(&exchange.question, CONTEXT_QUESTION_CHARS)),
                    format!("A{}: {}", n, truncate_chars(&exchange.answer, CONTEXT_ANSWER_CHARS)),
                ]
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
