//! Two-tier topic relevance check.
//!
//! Tier one compares the question embedding against every FAQ embedding.
//! Only scores inside the borderline band go to tier two, an LLM judgment
//! given a short summary of what the business covers. Any failure along the
//! way accepts the question.

use crate::brain::similarity::max_similarity;
use crate::config::AssistConfig;
use crate::error::Result;
use crate::models::{FaqEmbedding, RelevanceMethod, RelevanceVerdict};
use crate::services::llm::extract_json;
use crate::services::lock_unpoisoned;
use crate::services::traits::{CompletionOptions, EmbeddingProvider, FaqStore, LlmClient};
use lru::LruCache;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const SUMMARY_CATEGORIES: usize = 10;
const SUMMARY_QUESTIONS: usize = 12;

#[derive(Debug, Deserialize)]
struct VerifyReply {
    is_relevant: bool,
    #[serde(default)]
    reason: String,
}

struct CachedEmbeddings {
    loaded_at: Instant,
    vectors: Arc<Vec<Vec<f32>>>,
}

pub struct RelevanceClassifier {
    faq_store: Arc<dyn FaqStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmClient>,
    accept_threshold: f32,
    reject_threshold: f32,
    cache_ttl: Duration,
    verify_options: CompletionOptions,
    faq_vectors: Mutex<Option<CachedEmbeddings>>,
    question_vectors: Mutex<LruCache<String, Vec<f32>>>,
}

impl RelevanceClassifier {
    const QUESTION_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(500) {
        Some(size) => size,
        None => panic!("Cache size must be non-zero"),
    };

    pub fn new(
        config: &AssistConfig,
        faq_store: Arc<dyn FaqStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            faq_store,
            embeddings,
            llm,
            accept_threshold: config.relevance_accept,
            reject_threshold: config.relevance_reject,
            cache_ttl: config.embedding_cache_ttl(),
            verify_options: CompletionOptions {
                temperature: config.llm.verify_temperature,
                max_tokens: config.llm.verify_max_tokens,
            },
            faq_vectors: Mutex::new(None),
            question_vectors: Mutex::new(LruCache::new(Self::QUESTION_CACHE_SIZE)),
        }
    }

    /// Drops the cached FAQ embeddings so the next check reloads them.
    pub fn invalidate_cache(&self) {
        *lock_unpoisoned(&self.faq_vectors) = None;
    }

    async fn faq_vectors(&self) -> Result<Arc<Vec<Vec<f32>>>> {
        if let Some(cached) = lock_unpoisoned(&self.faq_vectors).as_ref() {
            if cached.loaded_at.elapsed() < self.cache_ttl {
                return Ok(Arc::clone(&cached.vectors));
            }
        }

        let vectors: Vec<Vec<f32>> = self
            .faq_store
            .faq_embeddings()
            .await?
            .into_iter()
            .map(|FaqEmbedding { vector, .. }| vector)
            .filter(|v| !v.is_empty())
            .collect();
        info!("Loaded {} FAQ embeddings for relevance checks", vectors.len());

        let vectors = Arc::new(vectors);
        *lock_unpoisoned(&self.faq_vectors) = Some(CachedEmbeddings {
            loaded_at: Instant::now(),
            vectors: Arc::clone(&vectors),
        });
        Ok(vectors)
    }

    async fn question_vector(&self, question: &str) -> Option<Vec<f32>> {
        let key = question.trim().to_lowercase();
        if let Some(hit) = lock_unpoisoned(&self.question_vectors).get(&key) {
            return Some(hit.clone());
        }

        let vector = self.embeddings.embed(question).await?;
        lock_unpoisoned(&self.question_vectors).put(key, vector.clone());
        Some(vector)
    }

    /// Decides whether a question is about something the FAQ covers.
    #[instrument(skip(self))]
    pub async fn is_relevant(&self, question: &str) -> RelevanceVerdict {
        let faq_vectors = match self.faq_vectors().await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return skipped("no FAQ embeddings available"),
            Err(e) => {
                warn!("Could not load FAQ embeddings: {}", e);
                return skipped("FAQ embeddings unavailable");
            }
        };

        let Some(query_vector) = self.question_vector(question).await else {
            return skipped("embedding capability unavailable");
        };

        let score = max_similarity(&query_vector, faq_vectors.iter().map(Vec::as_slice));
        debug!(score, "Best FAQ similarity");

        if score >= self.accept_threshold {
            return RelevanceVerdict {
                is_relevant: true,
                score,
                method: RelevanceMethod::Vector,
                reason: "similar to existing FAQ content".to_string(),
            };
        }
        if score < self.reject_threshold {
            return RelevanceVerdict {
                is_relevant: false,
                score,
                method: RelevanceMethod::Vector,
                reason: "unrelated to FAQ content".to_string(),
            };
        }

        self.verify_with_llm(question, score).await
    }

    async fn verify_with_llm(&self, question: &str, score: f32) -> RelevanceVerdict {
        let accept = |reason: &str| RelevanceVerdict {
            is_relevant: true,
            score,
            method: RelevanceMethod::VectorAi,
            reason: reason.to_string(),
        };

        if !self.llm.is_available() {
            return accept("borderline, verification unavailable");
        }

        let summary = match self.business_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Could not build business summary: {}", e);
                return accept("borderline, verification unavailable");
            }
        };

        let prompt = build_verify_prompt(&summary, question);
        let completion = match self.llm.complete(&prompt, self.verify_options).await {
            Ok(c) if c.is_truncated() => {
                warn!("Relevance verification hit the token limit");
                return accept("borderline, verification truncated");
            }
            Ok(c) => c,
            Err(e) => {
                warn!("Relevance verification failed: {}", e);
                return accept("borderline, verification failed");
            }
        };

        match extract_json::<VerifyReply>(&completion.text) {
            Ok(reply) => RelevanceVerdict {
                is_relevant: reply.is_relevant,
                score,
                method: RelevanceMethod::VectorAi,
                reason: reply.reason,
            },
            Err(e) => {
                warn!("Unparseable relevance verdict: {}", e);
                accept("borderline, verdict unparseable")
            }
        }
    }

    async fn business_summary(&self) -> Result<String> {
        let faqs = self.faq_store.load().await?;

        let categories: BTreeSet<&str> = faqs
            .iter()
            .map(|f| f.category.trim())
            .filter(|c| !c.is_empty())
            .collect();
        let categories: Vec<&str> = categories.into_iter().take(SUMMARY_CATEGORIES).collect();

        let samples: Vec<String> = faqs
            .iter()
            .take(SUMMARY_QUESTIONS)
            .map(|f| format!("- {}", f.question))
            .collect();

        Ok(format!(
            "Topics: {}\nExample questions:\n{}",
            if categories.is_empty() { "general".to_string() } else { categories.join(", ") },
            samples.join("\n")
        ))
    }
}

fn skipped(reason: &str) -> RelevanceVerdict {
    RelevanceVerdict {
        is_relevant: true,
        score: 0.0,
        method: RelevanceMethod::Skipped,
        reason: reason.to_string(),
    }
}

fn build_verify_prompt(summary: &str, question: &str) -> String {
    format!(
        "You check whether a customer question belongs to a business's support scope.\n\n\
         Business overview:\n{summary}\n\n\
         Question: \"{question}\"\n\n\
         Is this question about the business, its products or its services? \
         Reply with JSON only: {{\"is_relevant\": true|false, \"reason\": \"short explanation\"}}"
    )
}
