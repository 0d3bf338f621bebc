//! In-memory collaborator implementations.
//!
//! Suitable for tests, demos and hosts that keep the gap log in process.
//! Every operation takes a single lock, so increments and read-modify-write
//! updates are atomic with respect to each other.

use super::lock_unpoisoned;
use crate::brain::keywords::{is_stopword, strip_punctuation};
use crate::error::{AppError, Result};
use crate::models::{
    ClusterStatus, ClusterUpdate, Confidence, FaqEmbedding, FaqRecord, GapCluster, GapQuery,
    GapQuestion, NewGapCluster, NewGapQuestion, SearchMatch,
};
use crate::services::traits::{
    ClusterStore, FaqStore, GapStore, SemanticSearch, TransientStore, UsageTracker,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

// --- Transient store ---

struct TransientEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-local key-value store with per-key expiry.
#[derive(Default)]
pub struct MemoryTransientStore {
    entries: Mutex<HashMap<String, TransientEntry>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops expired entries. Called whenever a key is created.
fn sweep_expired(entries: &mut HashMap<String, TransientEntry>, now: Instant) {
    entries.retain(|_, entry| entry.expires_at > now);
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let mut entries = lock_unpoisoned(&self.entries);
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let mut entries = lock_unpoisoned(&self.entries);
        let now = Instant::now();
        if !entries.contains_key(key) {
            sweep_expired(&mut entries, now);
        }
        entries.insert(
            key.to_string(),
            TransientEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        lock_unpoisoned(&self.entries).remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut entries = lock_unpoisoned(&self.entries);
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(key) {
            if entry.expires_at > now {
                let next = entry.value.as_u64().unwrap_or(0) + 1;
                entry.value = serde_json::Value::from(next);
                return Ok(next);
            }
        }

        sweep_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            TransientEntry {
                value: serde_json::Value::from(1u64),
                expires_at: now + ttl,
            },
        );
        Ok(1)
    }
}

// --- Gap questions ---

#[derive(Default)]
struct GapState {
    next_id: i64,
    questions: Vec<GapQuestion>,
}

/// Gap log kept in a vector, ordered by insertion.
#[derive(Default)]
pub struct MemoryGapStore {
    state: Mutex<GapState>,
}

impl MemoryGapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored question.
    pub fn all(&self) -> Vec<GapQuestion> {
        lock_unpoisoned(&self.state).questions.clone()
    }
}

fn matches_query(question: &GapQuestion, clustered: Option<bool>, resolved: Option<bool>) -> bool {
    clustered.map_or(true, |c| question.is_clustered == c)
        && resolved.map_or(true, |r| question.is_resolved == r)
}

#[async_trait]
impl GapStore for MemoryGapStore {
    async fn insert_question(&self, question: NewGapQuestion) -> Result<i64> {
        let mut state = lock_unpoisoned(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.questions.push(GapQuestion {
            id,
            question_text: question.question_text,
            session_id: question.session_id,
            user_id: question.user_id,
            page_id: question.page_id,
            faq_confidence: question.faq_confidence,
            faq_match_id: question.faq_match_id,
            asked_date: Utc::now(),
            is_clustered: false,
            cluster_id: None,
            is_resolved: false,
            context: question.context,
        });
        Ok(id)
    }

    async fn get_questions(&self, query: GapQuery) -> Result<Vec<GapQuestion>> {
        let state = lock_unpoisoned(&self.state);
        Ok(state
            .questions
            .iter()
            .filter(|q| matches_query(q, query.clustered, query.resolved))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn count(&self, clustered: Option<bool>, resolved: Option<bool>) -> Result<usize> {
        let state = lock_unpoisoned(&self.state);
        Ok(state
            .questions
            .iter()
            .filter(|q| matches_query(q, clustered, resolved))
            .count())
    }

    async fn mark_clustered(&self, ids: &[i64], cluster_id: i64) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        for question in state.questions.iter_mut().filter(|q| ids.contains(&q.id)) {
            question.is_clustered = true;
            question.cluster_id = Some(cluster_id);
        }
        Ok(())
    }

    async fn resolve_question(&self, id: i64) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        let question = state
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| AppError::Store(format!("gap question {id} not found")))?;
        question.is_resolved = true;
        Ok(())
    }

    async fn questions_for_cluster(&self, cluster_id: i64) -> Result<Vec<GapQuestion>> {
        let state = lock_unpoisoned(&self.state);
        Ok(state
            .questions
            .iter()
            .filter(|q| q.cluster_id == Some(cluster_id))
            .cloned()
            .collect())
    }
}

// --- Clusters ---

#[derive(Default)]
struct ClusterState {
    next_id: i64,
    clusters: Vec<GapCluster>,
}

/// Cluster table kept in memory. Names compare case-insensitively.
#[derive(Default)]
pub struct MemoryClusterStore {
    state: Mutex<ClusterState>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn create_cluster(&self, cluster: NewGapCluster) -> Result<i64> {
        let mut state = lock_unpoisoned(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        state.clusters.push(GapCluster {
            id,
            cluster_name: cluster.cluster_name,
            cluster_description: cluster.cluster_description,
            question_count: cluster.question_count,
            sample_questions: cluster.sample_questions,
            sample_contexts: cluster.sample_contexts,
            suggested_question: cluster.suggested_question,
            suggested_answer: cluster.suggested_answer,
            action_type: cluster.action_type,
            existing_faq_id: cluster.existing_faq_id,
            priority_score: cluster.priority_score,
            status: ClusterStatus::New,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_cluster(&self, id: i64, update: ClusterUpdate) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        let cluster = state
            .clusters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::Store(format!("cluster {id} not found")))?;

        if let Some(description) = update.cluster_description {
            cluster.cluster_description = description;
        }
        if let Some(count) = update.question_count {
            cluster.question_count = count;
        }
        if let Some(samples) = update.sample_questions {
            cluster.sample_questions = samples;
        }
        if let Some(contexts) = update.sample_contexts {
            cluster.sample_contexts = contexts;
        }
        if let Some(question) = update.suggested_question {
            cluster.suggested_question = question;
        }
        if let Some(answer) = update.suggested_answer {
            cluster.suggested_answer = answer;
        }
        if let Some(action) = update.action_type {
            cluster.action_type = action;
        }
        if let Some(existing) = update.existing_faq_id {
            cluster.existing_faq_id = existing;
        }
        if let Some(priority) = update.priority_score {
            cluster.priority_score = priority;
        }
        cluster.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, id: i64, status: ClusterStatus) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        let cluster = state
            .clusters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::Store(format!("cluster {id} not found")))?;
        cluster.status = status;
        cluster.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<GapCluster>> {
        let state = lock_unpoisoned(&self.state);
        let wanted = name.trim().to_lowercase();
        Ok(state
            .clusters
            .iter()
            .find(|c| c.cluster_name.trim().to_lowercase() == wanted)
            .cloned())
    }

    async fn get(&self, id: i64) -> Result<Option<GapCluster>> {
        let state = lock_unpoisoned(&self.state);
        Ok(state.clusters.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, status: Option<ClusterStatus>, limit: usize) -> Result<Vec<GapCluster>> {
        let state = lock_unpoisoned(&self.state);
        let mut clusters: Vec<GapCluster> = state
            .clusters
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        clusters.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        clusters.truncate(limit);
        Ok(clusters)
    }
}

// --- FAQ ---

/// FAQ list with a lexical-overlap search and hit counting.
#[derive(Default)]
pub struct MemoryFaqStore {
    faqs: Vec<FaqRecord>,
    embeddings: Vec<FaqEmbedding>,
    hits: Mutex<Vec<(i64, f32)>>,
}

impl MemoryFaqStore {
    pub fn new(faqs: Vec<FaqRecord>) -> Self {
        Self {
            faqs,
            ..Default::default()
        }
    }

    pub fn with_embeddings(mut self, embeddings: Vec<FaqEmbedding>) -> Self {
        self.embeddings = embeddings;
        self
    }

    /// Every `(faq_id, score)` recorded so far.
    pub fn hits(&self) -> Vec<(i64, f32)> {
        lock_unpoisoned(&self.hits).clone()
    }
}

fn content_words(text: &str) -> HashSet<String> {
    strip_punctuation(text)
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !is_stopword(w))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl FaqStore for MemoryFaqStore {
    async fn load(&self) -> Result<Vec<FaqRecord>> {
        Ok(self.faqs.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FaqRecord>> {
        Ok(self.faqs.iter().find(|f| f.id == id).cloned())
    }

    async fn faq_embeddings(&self) -> Result<Vec<FaqEmbedding>> {
        Ok(self.embeddings.clone())
    }
}

#[async_trait]
impl SemanticSearch for MemoryFaqStore {
    /// Score is the share of the query's content words found in the FAQ
    /// question or keywords.
    async fn find_best_match(
        &self,
        query: &str,
        min_threshold: f32,
    ) -> Result<Option<SearchMatch>> {
        let query_words = content_words(query);
        if query_words.is_empty() {
            return Ok(None);
        }

        let best = self
            .faqs
            .iter()
            .map(|faq| {
                let mut faq_words = content_words(&faq.question);
                faq_words.extend(faq.keywords.iter().map(|k| k.to_lowercase()));
                let overlap = query_words.intersection(&faq_words).count();
                (faq, overlap as f32 / query_words.len() as f32)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best
            .filter(|(_, score)| *score > 0.0 && *score >= min_threshold)
            .map(|(faq, score)| SearchMatch {
                faq: faq.clone(),
                score,
                confidence: Confidence::from_score(score),
                search_type: "keyword".to_string(),
            }))
    }
}

#[async_trait]
impl UsageTracker for MemoryFaqStore {
    async fn record_hit(&self, faq_id: i64, score: f32) -> Result<()> {
        lock_unpoisoned(&self.hits).push((faq_id, score));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionType;

    fn new_question(text: &str) -> NewGapQuestion {
        NewGapQuestion {
            question_text: text.to_string(),
            session_id: "s".to_string(),
            user_id: None,
            page_id: None,
            faq_confidence: 0.0,
            faq_match_id: None,
            context: String::new(),
        }
    }

    #[tokio::test]
    async fn test_transient_increment_and_expiry() {
        let store = MemoryTransientStore::new();
        let ttl = Duration::from_millis(40);

        assert_eq!(store.increment("k", ttl).await.unwrap(), 1);
        assert_eq!(store.increment("k", ttl).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.increment("k", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transient_sweeps_abandoned_keys() {
        let store = MemoryTransientStore::new();
        let short = Duration::from_millis(20);
        let long = Duration::from_secs(60);

        store.increment("gap_rl_gone", short).await.unwrap();
        store.set("chat_history_gone", serde_json::json!([]), short).await.unwrap();
        assert_eq!(store.len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.set("chat_history_new", serde_json::json!([]), long).await.unwrap();
        assert_eq!(store.len(), 1);

        store.increment("gap_rl_new", long).await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get("chat_history_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transient_get_set_delete() {
        let store = MemoryTransientStore::new();
        let ttl = Duration::from_secs(60);

        store.set("a", serde_json::json!(["x"]), ttl).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(serde_json::json!(["x"])));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_gap_store_filters() {
        let store = MemoryGapStore::new();
        let a = store.insert_question(new_question("one")).await.unwrap();
        let b = store.insert_question(new_question("two")).await.unwrap();
        store.insert_question(new_question("three")).await.unwrap();

        store.mark_clustered(&[a, b], 7).await.unwrap();
        store.resolve_question(a).await.unwrap();

        assert_eq!(store.count(None, None).await.unwrap(), 3);
        assert_eq!(store.count(Some(true), None).await.unwrap(), 2);
        assert_eq!(store.count(None, Some(true)).await.unwrap(), 1);

        let pending = store.get_questions(GapQuery::pending(10)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].question_text, "three");

        let members = store.questions_for_cluster(7).await.unwrap();
        assert_eq!(members.len(), 2);
        assert!(store.resolve_question(99).await.is_err());
    }

    #[tokio::test]
    async fn test_cluster_store_name_lookup_and_order() {
        let store = MemoryClusterStore::new();
        let cluster = |name: &str, priority: f32| NewGapCluster {
            cluster_name: name.to_string(),
            cluster_description: String::new(),
            question_count: 2,
            sample_questions: vec![],
            sample_contexts: vec![],
            suggested_question: String::new(),
            suggested_answer: String::new(),
            action_type: ActionType::Create,
            existing_faq_id: None,
            priority_score: priority,
        };

        store.create_cluster(cluster("Shipping Costs", 20.0)).await.unwrap();
        let id = store.create_cluster(cluster("Returns", 60.0)).await.unwrap();

        let found = store.get_by_name("shipping costs").await.unwrap();
        assert!(found.is_some());

        let listed = store.list(None, 10).await.unwrap();
        assert_eq!(listed[0].id, id);

        store.update_status(id, ClusterStatus::Dismissed).await.unwrap();
        assert_eq!(store.list(Some(ClusterStatus::New), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keyword_search() {
        let store = MemoryFaqStore::new(vec![
            FaqRecord {
                id: 1,
                question: "What are your opening hours?".to_string(),
                answer: "9 to 5".to_string(),
                category: "store".to_string(),
                keywords: vec!["hours".to_string()],
            },
            FaqRecord {
                id: 2,
                question: "How do I return an item?".to_string(),
                answer: "Use the returns form".to_string(),
                category: "orders".to_string(),
                keywords: vec!["refund".to_string()],
            },
        ]);

        let hit = store
            .find_best_match("opening hours on sunday", 0.3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.faq.id, 1);

        assert!(store.find_best_match("quantum physics", 0.3).await.unwrap().is_none());

        store.record_hit(1, 0.9).await.unwrap();
        assert_eq!(store.hits(), vec![(1, 0.9)]);
    }
}
