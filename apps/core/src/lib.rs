//! # FAQ Assist Core
//!
//! Support layer for an FAQ chatbot: follow-up detection and query
//! enrichment, knowledge-gap filtering, and LLM clustering of unanswered
//! questions into FAQ suggestions.
//!
//! Storage, vector search and the LLM are collaborators behind the traits in
//! [`services::traits`]; in-memory stores, an HTTP completion client and a
//! local embedding provider are included.

pub mod brain;
pub mod config;
pub mod error;
pub mod gaps;
pub mod models;
pub mod rate_limiter;
pub mod search;
pub mod services;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use config::{AssistConfig, LlmConfig};
pub use error::{AppError, Result};
pub use gaps::{GapClusterer, GapRecorder, QuestionGate};
pub use search::{ContextAwareSearch, SearchRequest};
