//! Collaborator seams and their implementations.
//!
//! - `traits`: the capabilities the pipelines depend on
//! - `memory`: in-process stores
//! - `llm`: HTTP completion client
//! - `embeddings`: FastEmbed provider

pub mod embeddings;
pub mod llm;
pub mod memory;
pub mod traits;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use embeddings::FastEmbedProvider;
pub use llm::{extract_json, llm_from_config, HttpLlmClient};
pub use memory::{MemoryClusterStore, MemoryFaqStore, MemoryGapStore, MemoryTransientStore};
pub use traits::*;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
