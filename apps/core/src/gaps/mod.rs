//! # Gap Module
//!
//! Everything after a question goes unanswered.
//!
//! - `gate`: decides whether a question is worth logging
//! - `recorder`: the gap logger used by search (gate, then store)
//! - `clusterer`: periodic LLM clustering of the log into FAQ suggestions

pub mod clusterer;
pub mod gate;
pub mod recorder;

pub use clusterer::{priority_score, GapClusterer};
pub use gate::QuestionGate;
pub use recorder::GapRecorder;
