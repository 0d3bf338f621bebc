//! Context-aware FAQ search.
//!
//! Follow-up questions are searched with conversation context first and then,
//! if that finds nothing, with the literal user input. Misses and weak matches
//! are reported to the gap logger.

use crate::brain::context::ContextEnricher;
use crate::brain::followup::FollowupDetector;
use crate::config::AssistConfig;
use crate::error::Result;
use crate::models::{Confidence, ConversationContext, FaqRecord, GapReport, SearchMatch, SearchOutcome};
use crate::services::traits::{GapLogger, SemanticSearch, UsageTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One incoming chatbot question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub page_id: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }
}

pub struct ContextAwareSearch {
    detector: FollowupDetector,
    enricher: Arc<ContextEnricher>,
    search: Arc<dyn SemanticSearch>,
    gap_logger: Arc<dyn GapLogger>,
    usage: Arc<dyn UsageTracker>,
    min_threshold: f32,
    low_confidence_score: f32,
}

impl ContextAwareSearch {
    pub fn new(
        config: &AssistConfig,
        enricher: Arc<ContextEnricher>,
        search: Arc<dyn SemanticSearch>,
        gap_logger: Arc<dyn GapLogger>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            detector: FollowupDetector::new(),
            enricher,
            search,
            gap_logger,
            usage,
            min_threshold: config.search_min_threshold,
            low_confidence_score: config.low_confidence_score,
        }
    }

    /// The matched FAQ, if any.
    pub async fn search(&self, request: &SearchRequest) -> Result<Option<FaqRecord>> {
        Ok(self.search_with_score(request).await?.faq)
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn search_with_score(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let query = request.query.as_str();
        let followup = self.detector.detect(query);

        // Needed for gap logging even when the query stands alone.
        let context = match self.enricher.get_context(&request.session_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Conversation context unavailable: {}", e);
                ConversationContext::default()
            }
        };
        let context_string = self.enricher.context_string(&context);

        let mut used_context = false;
        let mut search_query = query.to_string();
        if followup.is_followup && !context.is_empty() {
            search_query = self.enricher.enrich(query, &context);
            used_context = true;
            debug!(reason = %followup.reason, enriched = %search_query, "Searching with context");
        }

        let mut found = self.search.find_best_match(&search_query, self.min_threshold).await?;

        if found.is_none() && used_context {
            debug!("Enriched search missed, retrying with the original query");
            search_query = query.to_string();
            used_context = false;
            found = self.search.find_best_match(query, self.min_threshold).await?;
        }

        let Some(SearchMatch { faq, score, confidence, search_type }) = found else {
            info!(is_followup = followup.is_followup, "No FAQ match");
            self.report_gap(request, None, 0.0, Confidence::None, &context_string)
                .await;
            return Ok(SearchOutcome {
                faq: None,
                score: 0.0,
                confidence: Confidence::None,
                search_type: None,
                used_context,
                is_followup: followup.is_followup,
                search_query,
            });
        };

        if let Err(e) = self.usage.record_hit(faq.id, score).await {
            warn!(faq_id = faq.id, "Failed to record FAQ usage: {}", e);
        }

        if score < self.low_confidence_score {
            debug!(
                faq_id = faq.id,
                score,
                confidence = confidence.label(),
                "Weak match, reporting as gap"
            );
            self.report_gap(request, Some(faq.id), score, confidence, &context_string)
                .await;
        }

        info!(
            faq_id = faq.id,
            score,
            confidence = confidence.label(),
            used_context,
            "FAQ matched"
        );
        Ok(SearchOutcome {
            faq: Some(faq),
            score,
            confidence,
            search_type: Some(search_type),
            used_context,
            is_followup: followup.is_followup,
            search_query,
        })
    }

    async fn report_gap(
        &self,
        request: &SearchRequest,
        matched_faq_id: Option<i64>,
        score: f32,
        confidence: Confidence,
        context: &str,
    ) {
        let report = GapReport {
            question: request.query.clone(),
            matched_faq_id,
            score,
            confidence,
            session_id: request.session_id.clone(),
            user_id: request.user_id,
            page_id: request.page_id,
            context: context.to_string(),
        };

        if let Err(e) = self.gap_logger.log_gap_question(report).await {
            warn!("Failed to log gap question: {}", e);
        }
    }
}
