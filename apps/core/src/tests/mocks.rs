//! Mock collaborators for testing.

use crate::error::{AppError, Result};
use crate::models::{
    ClusterStatus, ClusterUpdate, Confidence, FaqRecord, GapCluster, GapReport, NewGapCluster,
    SearchMatch,
};
use crate::services::memory::MemoryClusterStore;
use crate::services::traits::{
    ClusterStore, Completion, CompletionOptions, EmbeddingProvider, FinishReason, GapLogger,
    LlmClient, SemanticSearch, UsageTracker,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn faq(id: i64, question: &str, category: &str) -> FaqRecord {
    FaqRecord {
        id,
        question: question.to_string(),
        answer: format!("Answer to: {}", question),
        category: category.to_string(),
        keywords: vec![],
    }
}

pub fn search_match(faq: FaqRecord, score: f32) -> SearchMatch {
    SearchMatch {
        faq,
        score,
        confidence: Confidence::from_score(score),
        search_type: "semantic".to_string(),
    }
}

// --- LLM ---

enum Scripted {
    Reply(String),
    Truncated(String),
    Fail,
}

/// LLM that plays back scripted replies in order and records every prompt.
pub struct MockLlm {
    script: Mutex<VecDeque<Scripted>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
    available: bool,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
            available: true,
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Scripted::Reply(text.to_string()))
    }

    pub fn truncated(self, text: &str) -> Self {
        self.push(Scripted::Truncated(text.to_string()))
    }

    pub fn failing(self) -> Self {
        self.push(Scripted::Fail)
    }

    /// Reply used once the script runs out.
    pub fn always(mut self, text: &str) -> Self {
        self.repeat = Some(text.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn push(self, step: Scripted) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, prompt: &str, _options: CompletionOptions) -> Result<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Scripted::Reply(text)) => Ok(Completion {
                text,
                finish_reason: FinishReason::Stop,
            }),
            Some(Scripted::Truncated(text)) => Ok(Completion {
                text,
                finish_reason: FinishReason::MaxTokens,
            }),
            Some(Scripted::Fail) => Err(AppError::Llm("Mock failure".to_string())),
            None => match &self.repeat {
                Some(text) => Ok(Completion {
                    text: text.clone(),
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(AppError::Llm("No scripted reply".to_string())),
            },
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

// --- Search ---

/// Search backend that only knows exact queries.
#[derive(Default)]
pub struct MockSearch {
    answers: HashMap<String, SearchMatch>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, query: &str, result: SearchMatch) -> Self {
        self.answers.insert(query.to_string(), result);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SemanticSearch for MockSearch {
    async fn find_best_match(&self, query: &str, min_threshold: f32) -> Result<Option<SearchMatch>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self
            .answers
            .get(query)
            .filter(|m| m.score >= min_threshold)
            .cloned())
    }
}

// --- Gap logging and usage ---

#[derive(Default)]
pub struct RecordingGapLogger {
    reports: Mutex<Vec<GapReport>>,
    fail: bool,
}

impl RecordingGapLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn reports(&self) -> Vec<GapReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl GapLogger for RecordingGapLogger {
    async fn log_gap_question(&self, report: GapReport) -> Result<bool> {
        if self.fail {
            return Err(AppError::Store("gap log offline".to_string()));
        }
        self.reports.lock().unwrap().push(report);
        Ok(true)
    }
}

#[derive(Default)]
pub struct CountingUsage {
    hits: Mutex<Vec<(i64, f32)>>,
}

impl CountingUsage {
    pub fn hits(&self) -> Vec<(i64, f32)> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageTracker for CountingUsage {
    async fn record_hit(&self, faq_id: i64, score: f32) -> Result<()> {
        self.hits.lock().unwrap().push((faq_id, score));
        Ok(())
    }
}

// --- Embeddings ---

/// Returns fixed vectors per text and counts calls.
#[derive(Default)]
pub struct FixedEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddings {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors.get(text).cloned()
    }
}

// --- Cluster store ---

/// Cluster store whose writes always fail; reads go to an empty store.
#[derive(Default)]
pub struct FailingClusterStore {
    inner: MemoryClusterStore,
}

#[async_trait]
impl ClusterStore for FailingClusterStore {
    async fn create_cluster(&self, _cluster: NewGapCluster) -> Result<i64> {
        Err(AppError::Store("cluster table locked".to_string()))
    }

    async fn update_cluster(&self, _id: i64, _update: ClusterUpdate) -> Result<()> {
        Err(AppError::Store("cluster table locked".to_string()))
    }

    async fn update_status(&self, id: i64, status: ClusterStatus) -> Result<()> {
        self.inner.update_status(id, status).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<GapCluster>> {
        self.inner.get_by_name(name).await
    }

    async fn get(&self, id: i64) -> Result<Option<GapCluster>> {
        self.inner.get(id).await
    }

    async fn list(&self, status: Option<ClusterStatus>, limit: usize) -> Result<Vec<GapCluster>> {
        self.inner.list(status, limit).await
    }
}
