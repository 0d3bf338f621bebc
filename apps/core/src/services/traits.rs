use crate::error::{AppError, Result};
use crate::models::{
    ClusterStatus, ClusterUpdate, FaqEmbedding, FaqRecord, GapCluster, GapQuery, GapQuestion,
    GapReport, NewGapCluster, NewGapQuestion, SearchMatch,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read access to the FAQ knowledge base.
#[async_trait]
pub trait FaqStore: Send + Sync {
    async fn load(&self) -> Result<Vec<FaqRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<FaqRecord>>;

    /// Precomputed FAQ embeddings. Stores without vectors return nothing.
    async fn faq_embeddings(&self) -> Result<Vec<FaqEmbedding>> {
        Ok(Vec::new())
    }
}

/// The vector search backend.
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Best FAQ match scoring at least `min_threshold`, if any.
    async fn find_best_match(&self, query: &str, min_threshold: f32)
        -> Result<Option<SearchMatch>>;
}

/// Text embedding capability. `None` means the capability is unavailable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Used when no embedding backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEmbeddings;

#[async_trait]
impl EmbeddingProvider for NoEmbeddings {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// Entry point for recording an unanswered or weakly answered question.
#[async_trait]
pub trait GapLogger: Send + Sync {
    /// Returns true if the question was stored.
    async fn log_gap_question(&self, report: GapReport) -> Result<bool>;
}

/// Persistence for gap questions.
#[async_trait]
pub trait GapStore: Send + Sync {
    async fn insert_question(&self, question: NewGapQuestion) -> Result<i64>;

    async fn get_questions(&self, query: GapQuery) -> Result<Vec<GapQuestion>>;

    /// Count with optional filters; `None` matches both states.
    async fn count(&self, clustered: Option<bool>, resolved: Option<bool>) -> Result<usize>;

    async fn mark_clustered(&self, ids: &[i64], cluster_id: i64) -> Result<()>;

    async fn resolve_question(&self, id: i64) -> Result<()>;

    async fn questions_for_cluster(&self, cluster_id: i64) -> Result<Vec<GapQuestion>>;
}

/// Persistence for gap clusters.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn create_cluster(&self, cluster: NewGapCluster) -> Result<i64>;

    async fn update_cluster(&self, id: i64, update: ClusterUpdate) -> Result<()>;

    async fn update_status(&self, id: i64, status: ClusterStatus) -> Result<()>;

    async fn get_by_name(&self, name: &str) -> Result<Option<GapCluster>>;

    async fn get(&self, id: i64) -> Result<Option<GapCluster>>;

    /// Clusters ordered by priority, highest first.
    async fn list(&self, status: Option<ClusterStatus>, limit: usize) -> Result<Vec<GapCluster>>;
}

/// Records which FAQ answered a query.
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn record_hit(&self, faq_id: i64, score: f32) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoUsageTracking;

#[async_trait]
impl UsageTracker for NoUsageTracking {
    async fn record_hit(&self, _faq_id: i64, _score: f32) -> Result<()> {
        Ok(())
    }
}

/// Sampling parameters for a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Why the model stopped producing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Output was cut at the token limit and must not be parsed.
    MaxTokens,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

impl Completion {
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::MaxTokens
    }
}

/// Black-box text completion service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<Completion>;

    /// False when the client cannot work at all (e.g., missing credentials).
    fn is_available(&self) -> bool {
        true
    }
}

/// Used when no LLM is configured. Every call fails with a config error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLlm;

#[async_trait]
impl LlmClient for NullLlm {
    async fn complete(&self, _prompt: &str, _options: CompletionOptions) -> Result<Completion> {
        Err(AppError::Config("no LLM client configured".to_string()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Session/process scoped key-value store with expiry.
#[async_trait]
pub trait TransientStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increments a counter and returns the new value. The expiry is
    /// set when the counter is created and left untouched afterwards.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;
}
