//! Batch clustering of gap questions into FAQ suggestions.
//!
//! Pending questions are sent to the LLM in fixed-size batches. Each reply
//! proposes clusters of related questions with a suggested FAQ entry, either
//! a new one (`create`) or a rewrite of an existing one (`improve`). Clusters
//! are upserted by name, so re-running over similar questions merges into the
//! existing cluster instead of duplicating it. A dismissed or resolved cluster
//! that receives new questions goes back to `new`.

use crate::config::AssistConfig;
use crate::error::Result;
use crate::models::{
    ActionType, ClusterRunSummary, ClusterStatus, ClusterUpdate, FaqRecord, GapCluster,
    GapQuery, GapQuestion, GapStats, NewGapCluster,
};
use crate::services::llm::extract_json;
use crate::services::traits::{ClusterStore, CompletionOptions, FaqStore, GapStore, LlmClient};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Sample questions (and their contexts) kept per cluster.
pub const MAX_SAMPLES: usize = 5;
/// Minimum members for a proposed cluster to be kept.
pub const MIN_CLUSTER_SIZE: usize = 2;
const MAX_FAQS_IN_PROMPT: usize = 60;
const MAX_CONTEXT_IN_PROMPT: usize = 120;

/// `count * 10`, boosted ×1.5 from 10 questions and ×1.2 from 5.
pub fn priority_score(question_count: usize) -> f32 {
    let base = question_count as f32 * 10.0;
    if question_count >= 10 {
        base * 1.5
    } else if question_count >= 5 {
        base * 1.2
    } else {
        base
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClusterReply {
    #[serde(default)]
    clusters: Vec<ClusterProposal>,
}

#[derive(Debug, Deserialize)]
struct ClusterProposal {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    question_ids: Vec<i64>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    existing_faq_id: Option<i64>,
    #[serde(default)]
    suggested_question: String,
    #[serde(default)]
    suggested_answer: String,
}

enum Upsert {
    Created(i64),
    Updated(i64),
}

pub struct GapClusterer {
    gaps: Arc<dyn GapStore>,
    clusters: Arc<dyn ClusterStore>,
    faqs: Arc<dyn FaqStore>,
    llm: Arc<dyn LlmClient>,
    min_questions: usize,
    batch_size: usize,
    max_batches: usize,
    batch_delay: Duration,
    options: CompletionOptions,
    unavailable_logged: AtomicBool,
}

impl GapClusterer {
    pub fn new(
        config: &AssistConfig,
        gaps: Arc<dyn GapStore>,
        clusters: Arc<dyn ClusterStore>,
        faqs: Arc<dyn FaqStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            gaps,
            clusters,
            faqs,
            llm,
            min_questions: config.min_questions_to_cluster,
            batch_size: config.batch_size,
            max_batches: config.max_batches,
            batch_delay: config.batch_delay(),
            options: CompletionOptions {
                temperature: config.llm.cluster_temperature,
                max_tokens: config.llm.cluster_max_tokens,
            },
            unavailable_logged: AtomicBool::new(false),
        }
    }

    /// Returns true if at least one cluster was created or updated.
    pub async fn run(&self, force: bool, single_batch: bool) -> Result<bool> {
        Ok(self.run_detailed(force, single_batch).await?.produced_clusters())
    }

    #[instrument(skip(self))]
    pub async fn run_detailed(&self, force: bool, single_batch: bool) -> Result<ClusterRunSummary> {
        let mut summary = ClusterRunSummary {
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        };

        if !self.llm.is_available() {
            if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
                error!("Gap clustering disabled: no usable LLM client (missing credentials?)");
            }
            return Ok(summary);
        }

        if !force {
            let pending = self.gaps.count(Some(false), Some(false)).await?;
            if pending < self.min_questions {
                info!(
                    pending,
                    required = self.min_questions,
                    "Not enough gap questions to cluster"
                );
                return Ok(summary);
            }
        }

        let faqs = self.faqs.load().await?;
        let max_batches = if single_batch { 1 } else { self.max_batches };
        // Questions the LLM left out stay pending; skip past them next time.
        let mut left_behind = 0;

        for batch_no in 0..max_batches {
            if batch_no > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let batch = self
                .gaps
                .get_questions(GapQuery::pending(self.batch_size).skip(left_behind))
                .await?;
            if batch.is_empty() {
                debug!(batch_no, "No more pending questions");
                break;
            }

            summary.batches += 1;
            summary.questions_processed += batch.len();

            let proposals = self.propose_clusters(&batch, &faqs).await;
            let mut assigned: HashSet<i64> = HashSet::new();

            for proposal in proposals {
                let members: Vec<&GapQuestion> = member_questions(&batch, &proposal.question_ids)
                    .into_iter()
                    .filter(|q| !assigned.contains(&q.id))
                    .collect();
                if proposal.name.trim().is_empty() || members.len() < MIN_CLUSTER_SIZE {
                    debug!(name = %proposal.name, members = members.len(), "Discarding cluster proposal");
                    continue;
                }

                let ids: Vec<i64> = members.iter().map(|q| q.id).collect();
                let (cluster_id, created) = match self.upsert(&proposal, &members, &faqs).await? {
                    Upsert::Created(id) => (id, true),
                    Upsert::Updated(id) => (id, false),
                };
                self.gaps.mark_clustered(&ids, cluster_id).await?;

                assigned.extend(ids);
                if created {
                    summary.clusters_created += 1;
                } else {
                    summary.clusters_updated += 1;
                }
            }

            left_behind += batch.len() - assigned.len();
            info!(
                batch_no,
                size = batch.len(),
                clustered = assigned.len(),
                "Gap batch processed"
            );

            if batch.len() < self.batch_size {
                break;
            }
        }

        info!(
            run_id = %summary.run_id,
            batches = summary.batches,
            created = summary.clusters_created,
            updated = summary.clusters_updated,
            "Gap clustering finished"
        );
        Ok(summary)
    }

    /// Asks the LLM for clusters. Failures of any kind yield no proposals.
    async fn propose_clusters(&self, batch: &[GapQuestion], faqs: &[FaqRecord]) -> Vec<ClusterProposal> {
        let prompt = build_cluster_prompt(batch, faqs);

        let completion = match self.llm.complete(&prompt, self.options).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Cluster generation failed: {}", e);
                return Vec::new();
            }
        };
        if completion.is_truncated() {
            warn!("Cluster generation hit the token limit; ignoring partial output");
            return Vec::new();
        }

        match extract_json::<ClusterReply>(&completion.text) {
            Ok(reply) => reply.clusters,
            Err(e) => {
                warn!("Unparseable cluster reply: {}", e);
                Vec::new()
            }
        }
    }

    async fn upsert(
        &self,
        proposal: &ClusterProposal,
        members: &[&GapQuestion],
        faqs: &[FaqRecord],
    ) -> Result<Upsert> {
        let name = proposal.name.trim();
        let (action_type, existing_faq_id) = resolve_action(proposal, faqs);

        if let Some(existing) = self.clusters.get_by_name(name).await? {
            let count = existing.question_count + members.len();
            let (samples, contexts) = merge_samples(&existing, members);

            let update = ClusterUpdate {
                cluster_description: non_empty(&proposal.description),
                question_count: Some(count),
                sample_questions: Some(samples),
                sample_contexts: Some(contexts),
                suggested_question: non_empty(&proposal.suggested_question),
                suggested_answer: non_empty(&proposal.suggested_answer),
                action_type: Some(action_type),
                existing_faq_id: Some(existing_faq_id),
                priority_score: Some(priority_score(count)),
            };
            self.clusters.update_cluster(existing.id, update).await?;
            if matches!(existing.status, ClusterStatus::Dismissed | ClusterStatus::FaqCreated) {
                warn!(
                    id = existing.id,
                    name,
                    previous = ?existing.status,
                    new_questions = members.len(),
                    "New questions matched a closed cluster, reopening it for review"
                );
                self.clusters
                    .update_status(existing.id, ClusterStatus::New)
                    .await?;
            }
            info!(id = existing.id, name, count, "Cluster updated");
            return Ok(Upsert::Updated(existing.id));
        }

        let samples = members.iter().take(MAX_SAMPLES);
        let cluster = NewGapCluster {
            cluster_name: name.to_string(),
            cluster_description: proposal.description.clone(),
            question_count: members.len(),
            sample_questions: samples.clone().map(|q| q.question_text.clone()).collect(),
            sample_contexts: samples.map(|q| q.context.clone()).collect(),
            suggested_question: proposal.suggested_question.clone(),
            suggested_answer: proposal.suggested_answer.clone(),
            action_type,
            existing_faq_id,
            priority_score: priority_score(members.len()),
        };
        let id = self.clusters.create_cluster(cluster).await?;
        info!(id, name, count = members.len(), "Cluster created");
        Ok(Upsert::Created(id))
    }

    /// Marks the cluster as turned into an FAQ and resolves its questions.
    /// Returns false if the cluster does not exist.
    pub async fn resolve(&self, cluster_id: i64) -> Result<bool> {
        if self.clusters.get(cluster_id).await?.is_none() {
            return Ok(false);
        }

        self.clusters
            .update_status(cluster_id, ClusterStatus::FaqCreated)
            .await?;
        let members = self.gaps.questions_for_cluster(cluster_id).await?;
        for question in &members {
            self.gaps.resolve_question(question.id).await?;
        }
        info!(cluster_id, resolved = members.len(), "Cluster resolved");
        Ok(true)
    }

    /// Dismisses the cluster. Member questions keep their resolution state.
    pub async fn dismiss(&self, cluster_id: i64) -> Result<bool> {
        self.set_status(cluster_id, ClusterStatus::Dismissed).await
    }

    pub async fn review(&self, cluster_id: i64) -> Result<bool> {
        self.set_status(cluster_id, ClusterStatus::Reviewed).await
    }

    async fn set_status(&self, cluster_id: i64, status: ClusterStatus) -> Result<bool> {
        if self.clusters.get(cluster_id).await?.is_none() {
            return Ok(false);
        }
        self.clusters.update_status(cluster_id, status).await?;
        info!(cluster_id, ?status, "Cluster status changed");
        Ok(true)
    }

    /// Clusters by priority, highest first.
    pub async fn list(&self, status: Option<ClusterStatus>, limit: usize) -> Result<Vec<GapCluster>> {
        self.clusters.list(status, limit).await
    }

    pub async fn stats(&self) -> Result<GapStats> {
        let mut stats = GapStats {
            total: self.gaps.count(None, None).await?,
            unclustered: self.gaps.count(Some(false), None).await?,
            clustered: self.gaps.count(Some(true), None).await?,
            resolved: self.gaps.count(None, Some(true)).await?,
            ..Default::default()
        };

        for cluster in self.clusters.list(None, usize::MAX).await? {
            match cluster.status {
                ClusterStatus::New => stats.clusters_new += 1,
                ClusterStatus::Reviewed => stats.clusters_reviewed += 1,
                ClusterStatus::FaqCreated => stats.clusters_faq_created += 1,
                ClusterStatus::Dismissed => stats.clusters_dismissed += 1,
            }
        }
        Ok(stats)
    }
}

/// Batch questions named by the LLM, in batch order, without duplicates.
/// Ids outside the batch are ignored.
fn member_questions<'a>(batch: &'a [GapQuestion], ids: &[i64]) -> Vec<&'a GapQuestion> {
    let wanted: HashSet<i64> = ids.iter().copied().collect();
    batch.iter().filter(|q| wanted.contains(&q.id)).collect()
}

/// `improve` needs an FAQ that actually exists; anything else becomes `create`.
fn resolve_action(proposal: &ClusterProposal, faqs: &[FaqRecord]) -> (ActionType, Option<i64>) {
    let wants_improve = proposal
        .action
        .as_deref()
        .is_some_and(|a| a.trim().eq_ignore_ascii_case("improve"));

    match (wants_improve, proposal.existing_faq_id) {
        (true, Some(id)) if faqs.iter().any(|f| f.id == id) => (ActionType::Improve, Some(id)),
        (true, _) => {
            warn!(
                name = %proposal.name,
                faq_id = ?proposal.existing_faq_id,
                "Improve proposal without a known FAQ, treating as create"
            );
            (ActionType::Create, None)
        }
        _ => (ActionType::Create, None),
    }
}

/// Existing samples first, then new ones, capped at `MAX_SAMPLES`. Contexts
/// stay parallel to questions.
fn merge_samples(existing: &GapCluster, members: &[&GapQuestion]) -> (Vec<String>, Vec<String>) {
    let mut questions = Vec::with_capacity(MAX_SAMPLES);
    let mut contexts = Vec::with_capacity(MAX_SAMPLES);

    for (i, question) in existing.sample_questions.iter().enumerate() {
        questions.push(question.clone());
        contexts.push(existing.sample_contexts.get(i).cloned().unwrap_or_default());
    }
    for member in members {
        if questions.contains(&member.question_text) {
            continue;
        }
        questions.push(member.question_text.clone());
        contexts.push(member.context.clone());
    }

    questions.truncate(MAX_SAMPLES);
    contexts.truncate(MAX_SAMPLES);
    (questions, contexts)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn build_cluster_prompt(batch: &[GapQuestion], faqs: &[FaqRecord]) -> String {
    let faq_list = if faqs.is_empty() {
        "(none yet)".to_string()
    } else {
        faqs.iter()
            .take(MAX_FAQS_IN_PROMPT)
            .map(|f| format!("- [FAQ {}] {}", f.id, f.question))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let questions = batch
        .iter()
        .map(|q| {
            if q.context.is_empty() {
                format!("- [{}] {}", q.id, q.question_text)
            } else {
                let context: String = q.context.chars().take(MAX_CONTEXT_IN_PROMPT).collect();
                format!("- [{}] {} (conversation: {})", q.id, q.question_text, context)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You analyse customer questions a support chatbot could not answer well.\n\n\
         Existing FAQs:\n{faq_list}\n\n\
         Unanswered questions (id in brackets):\n{questions}\n\n\
         Group questions that ask about the same thing. For each group:\n\
         - Give it a short, stable name (2 to 5 words) and a one-sentence description.\n\
         - Use \"improve\" with existing_faq_id only if rewriting that FAQ answers these \
         questions without breaking what it already answers; otherwise use \"create\".\n\
         - Propose the FAQ question and a complete answer.\n\
         - Only include groups with at least 2 questions. Skip spam and nonsense.\n\n\
         Reply with JSON only:\n\
         {{\"clusters\": [{{\"name\": \"...\", \"description\": \"...\", \"question_ids\": [1, 2], \
         \"action\": \"create\", \"existing_faq_id\": null, \
         \"suggested_question\": \"...\", \"suggested_answer\": \"...\"}}]}}"
    )
}
