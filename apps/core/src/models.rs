use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// --- Conversation ---

/// Who produced a transient log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

/// A raw entry as stored in the transient conversation log (newest last).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            text: text.into(),
        }
    }
}

/// One completed question/answer turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Recent conversation state, rebuilt for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Newest question, kept for callers that only look at the last turn.
    pub last_question: String,
    pub last_answer: String,
    /// Derived from `history`, never set on its own.
    pub topic: String,
    /// Oldest first, at most three exchanges.
    pub history: Vec<Exchange>,
}

impl ConversationContext {
    /// True when there is nothing to enrich a query with.
    pub fn is_empty(&self) -> bool {
        self.topic.is_empty() && self.last_question.is_empty()
    }
}

// --- Follow-up detection ---

/// Which rule classified the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupReason {
    PronounReference,
    FollowupPhrase,
    ShortQuestion,
    Standalone,
}

impl fmt::Display for FollowupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FollowupReason::PronounReference => "pronoun_reference",
            FollowupReason::FollowupPhrase => "followup_phrase",
            FollowupReason::ShortQuestion => "short_question",
            FollowupReason::Standalone => "standalone",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowupResult {
    pub is_followup: bool,
    pub reason: FollowupReason,
}

// --- FAQ & search ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Stored embedding of an FAQ entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEmbedding {
    pub faq_id: i64,
    pub vector: Vec<f32>,
}

/// Match quality bucket as reported by the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Default bucketing for backends that only report a raw score.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.6 {
            Confidence::Medium
        } else if score > 0.0 {
            Confidence::Low
        } else {
            Confidence::None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Confidence::None => "none",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Best match returned by the semantic search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub faq: FaqRecord,
    pub score: f32,
    pub confidence: Confidence,
    pub search_type: String,
}

/// Full result of a context-aware search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    #[serde(rename = "match")]
    pub faq: Option<FaqRecord>,
    pub score: f32,
    pub confidence: Confidence,
    pub search_type: Option<String>,
    pub used_context: bool,
    pub is_followup: bool,
    /// Query sent on the final search attempt.
    pub search_query: String,
}

// --- Gap questions ---

/// Arguments of a gap-logging call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub question: String,
    pub matched_faq_id: Option<i64>,
    pub score: f32,
    pub confidence: Confidence,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub page_id: Option<i64>,
    /// Rendered recent exchanges, empty when there was no history.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGapQuestion {
    pub question_text: String,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub page_id: Option<i64>,
    pub faq_confidence: f32,
    pub faq_match_id: Option<i64>,
    pub context: String,
}

impl From<GapReport> for NewGapQuestion {
    fn from(report: GapReport) -> Self {
        Self {
            question_text: report.question,
            session_id: report.session_id,
            user_id: report.user_id,
            page_id: report.page_id,
            faq_confidence: report.score,
            faq_match_id: report.matched_faq_id,
            context: report.context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapQuestion {
    pub id: i64,
    pub question_text: String,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub page_id: Option<i64>,
    pub faq_confidence: f32,
    pub faq_match_id: Option<i64>,
    pub asked_date: DateTime<Utc>,
    pub is_clustered: bool,
    pub cluster_id: Option<i64>,
    pub is_resolved: bool,
    #[serde(default)]
    pub context: String,
}

/// Filter for gap question listings. `None` means "either".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GapQuery {
    pub limit: usize,
    /// Matching rows to skip, oldest first.
    pub offset: usize,
    pub resolved: Option<bool>,
    pub clustered: Option<bool>,
}

impl GapQuery {
    /// Open questions not yet assigned to any cluster.
    pub fn pending(limit: usize) -> Self {
        Self {
            limit,
            offset: 0,
            resolved: Some(false),
            clustered: Some(false),
        }
    }

    pub fn skip(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

// --- Clusters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Improve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    New,
    Reviewed,
    FaqCreated,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCluster {
    pub id: i64,
    pub cluster_name: String,
    pub cluster_description: String,
    pub question_count: usize,
    pub sample_questions: Vec<String>,
    /// Parallel to `sample_questions`.
    pub sample_contexts: Vec<String>,
    pub suggested_question: String,
    pub suggested_answer: String,
    pub action_type: ActionType,
    pub existing_faq_id: Option<i64>,
    pub priority_score: f32,
    pub status: ClusterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGapCluster {
    pub cluster_name: String,
    pub cluster_description: String,
    pub question_count: usize,
    pub sample_questions: Vec<String>,
    pub sample_contexts: Vec<String>,
    pub suggested_question: String,
    pub suggested_answer: String,
    pub action_type: ActionType,
    pub existing_faq_id: Option<i64>,
    pub priority_score: f32,
}

/// Partial update applied when a cluster with the same name already exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterUpdate {
    pub cluster_description: Option<String>,
    pub question_count: Option<usize>,
    pub sample_questions: Option<Vec<String>>,
    pub sample_contexts: Option<Vec<String>>,
    pub suggested_question: Option<String>,
    pub suggested_answer: Option<String>,
    pub action_type: Option<ActionType>,
    pub existing_faq_id: Option<Option<i64>>,
    pub priority_score: Option<f32>,
}

/// What one clustering run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRunSummary {
    pub run_id: String,
    pub batches: usize,
    pub questions_processed: usize,
    pub clusters_created: usize,
    pub clusters_updated: usize,
}

impl ClusterRunSummary {
    pub fn produced_clusters(&self) -> bool {
        self.clusters_created + self.clusters_updated > 0
    }
}

/// Dashboard counters for the gap log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapStats {
    pub total: usize,
    pub unclustered: usize,
    pub clustered: usize,
    pub resolved: usize,
    pub clusters_new: usize,
    pub clusters_reviewed: usize,
    pub clusters_faq_created: usize,
    pub clusters_dismissed: usize,
}

// --- Validation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Valid,
    TooShort,
    TooLong,
    TooFewWords,
    Gibberish,
    Spam,
    LowQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: ValidationReason,
    pub quality_score: f32,
    pub flags: BTreeSet<String>,
}

impl ValidationResult {
    pub fn reject(reason: ValidationReason, quality_score: f32, flags: BTreeSet<String>) -> Self {
        Self {
            is_valid: false,
            reason,
            quality_score,
            flags,
        }
    }
}

// --- Relevance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelevanceMethod {
    #[serde(rename = "vector")]
    Vector,
    #[serde(rename = "vector+ai")]
    VectorAi,
    /// No embeddings available, the question was accepted unchecked.
    #[serde(rename = "skipped")]
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    pub score: f32,
    pub method: RelevanceMethod,
    pub reason: String,
}

// --- Gap gate ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Accepted,
    ConfidentMatch,
    Invalid(ValidationReason),
    OffTopic,
    RateLimited,
}

/// Whether a question should enter the gap log, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapDecision {
    pub should_log: bool,
    pub reason: GateReason,
    pub validation: Option<ValidationResult>,
    pub relevance: Option<RelevanceVerdict>,
}
