//! The decision whether a question enters the gap log.

use crate::brain::relevance::RelevanceClassifier;
use crate::brain::validator::{QuestionValidator, ValidateOptions};
use crate::config::AssistConfig;
use crate::error::Result;
use crate::models::{GapDecision, GateReason};
use crate::rate_limiter::SessionRateLimiter;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Runs, in order: confident-match check, validation, relevance, rate limit.
/// The rate limit comes last so rejected questions don't use up the quota.
pub struct QuestionGate {
    validator: QuestionValidator,
    relevance: Arc<RelevanceClassifier>,
    rate_limiter: SessionRateLimiter,
    confidence_threshold: f32,
    check_relevance: bool,
    rate_limit_enabled: bool,
}

impl QuestionGate {
    pub fn new(
        config: &AssistConfig,
        relevance: Arc<RelevanceClassifier>,
        rate_limiter: SessionRateLimiter,
    ) -> Self {
        Self {
            validator: QuestionValidator::new(config),
            relevance,
            rate_limiter,
            confidence_threshold: config.confidence_threshold,
            check_relevance: config.check_relevance,
            rate_limit_enabled: config.rate_limit_enabled,
        }
    }

    #[instrument(skip(self, question), fields(len = question.len()))]
    pub async fn should_log(
        &self,
        question: &str,
        faq_confidence: f32,
        session_id: &str,
    ) -> Result<GapDecision> {
        if faq_confidence >= self.confidence_threshold {
            return Ok(GapDecision {
                should_log: false,
                reason: GateReason::ConfidentMatch,
                validation: None,
                relevance: None,
            });
        }

        let validation = self
            .validator
            .validate(question, faq_confidence, &ValidateOptions::default());
        if !validation.is_valid {
            debug!(reason = ?validation.reason, "Question failed validation");
            return Ok(GapDecision {
                should_log: false,
                reason: GateReason::Invalid(validation.reason),
                validation: Some(validation),
                relevance: None,
            });
        }

        let relevance = if self.check_relevance {
            let verdict = self.relevance.is_relevant(question).await;
            if !verdict.is_relevant {
                debug!(score = verdict.score, "Question is off-topic");
                return Ok(GapDecision {
                    should_log: false,
                    reason: GateReason::OffTopic,
                    validation: Some(validation),
                    relevance: Some(verdict),
                });
            }
            Some(verdict)
        } else {
            None
        };

        if self.rate_limit_enabled && !self.rate_limiter.check(session_id).await? {
            debug!("Session exceeded the gap logging limit");
            return Ok(GapDecision {
                should_log: false,
                reason: GateReason::RateLimited,
                validation: Some(validation),
                relevance,
            });
        }

        Ok(GapDecision {
            should_log: true,
            reason: GateReason::Accepted,
            validation: Some(validation),
            relevance,
        })
    }
}
