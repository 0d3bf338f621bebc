//! # Brain Module
//!
//! Fast, non-LLM analysis of user questions. Everything here is pure or
//! nearly so; the only I/O is the chat log read by `context` and the
//! embedding/LLM calls made by `relevance`.
//!
//! ## Components
//! - `keywords`: stop words and topic extraction
//! - `gibberish`, `spam`, `quality`: text heuristics used by the validator
//! - `similarity`: cosine similarity
//! - `followup`: follow-up vs standalone classification
//! - `context`: conversation context and query enrichment
//! - `validator`: the question validation pipeline
//! - `relevance`: vector + LLM topic relevance

pub mod context;
pub mod followup;
pub mod gibberish;
pub mod keywords;
pub mod quality;
pub mod relevance;
pub mod similarity;
pub mod spam;
pub mod validator;

pub use context::ContextEnricher;
pub use followup::FollowupDetector;
pub use keywords::extract_topic;
pub use relevance::RelevanceClassifier;
pub use similarity::cosine_similarity;
pub use validator::{QuestionValidator, ValidateOptions};
