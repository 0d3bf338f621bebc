use crate::error::Result;
use crate::gaps::gate::QuestionGate;
use crate::models::{GapReport, NewGapQuestion};
use crate::services::traits::{GapLogger, GapStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Gap logger that filters through the [`QuestionGate`] before writing.
pub struct GapRecorder {
    gate: QuestionGate,
    store: Arc<dyn GapStore>,
}

impl GapRecorder {
    pub fn new(gate: QuestionGate, store: Arc<dyn GapStore>) -> Self {
        Self { gate, store }
    }
}

#[async_trait]
impl GapLogger for GapRecorder {
    async fn log_gap_question(&self, report: GapReport) -> Result<bool> {
        let decision = self
            .gate
            .should_log(&report.question, report.score, &report.session_id)
            .await?;

        if !decision.should_log {
            debug!(reason = ?decision.reason, "Gap question not logged");
            return Ok(false);
        }

        let id = self
            .store
            .insert_question(NewGapQuestion::from(report))
            .await?;
        info!(id, "Gap question logged");
        Ok(true)
    }
}
