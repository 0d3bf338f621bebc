//! Runtime configuration.
//!
//! Every threshold used by the detection, validation and clustering pipelines
//! lives here and is handed to each component at construction time.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use validator::{Validate, ValidationError};

/// Prefix for all environment overrides.
pub const ENV_PREFIX: &str = "FAQ_ASSIST_";

/// Settings for the remote LLM completion service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the completion server (a `/completion` endpoint is appended).
    #[validate(url)]
    pub base_url: String,
    /// Bearer token. Clustering and relevance verification are disabled without it.
    pub auth_token: Option<String>,
    /// Total request timeout.
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Maximum silence between two body chunks before the request is abandoned.
    #[validate(range(min = 1))]
    pub stall_timeout_secs: u64,
    #[validate(range(min = 0.0, max = 2.0))]
    pub cluster_temperature: f32,
    #[validate(range(min = 1))]
    pub cluster_max_tokens: u32,
    #[validate(range(min = 0.0, max = 2.0))]
    pub verify_temperature: f32,
    #[validate(range(min = 1))]
    pub verify_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth_token: None,
            timeout_secs: 120,
            stall_timeout_secs: 30,
            cluster_temperature: 0.3,
            cluster_max_tokens: 4096,
            verify_temperature: 0.1,
            verify_max_tokens: 200,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

/// Thresholds and toggles for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_ranges", skip_on_field_errors = false))]
pub struct AssistConfig {
    // --- Question validation ---
    #[validate(range(min = 1))]
    pub min_length: usize,
    #[validate(range(min = 1))]
    pub max_length: usize,
    #[validate(range(min = 1))]
    pub min_words: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub gibberish_cutoff: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_quality_score: f32,
    pub check_gibberish: bool,
    pub check_spam: bool,
    pub check_relevance: bool,

    // --- Search / gap logging ---
    /// Questions answered at or above this confidence are never logged as gaps.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,
    /// Matches below this score are logged as weak matches.
    #[validate(range(min = 0.0, max = 1.0))]
    pub low_confidence_score: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub search_min_threshold: f32,

    // --- Relevance ---
    #[validate(range(min = 0.0, max = 1.0))]
    pub relevance_accept: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub relevance_reject: f32,
    #[validate(range(min = 1))]
    pub embedding_cache_ttl_secs: u64,

    // --- Rate limiting ---
    pub rate_limit_enabled: bool,
    #[validate(range(min = 1))]
    pub rate_limit_window_secs: u64,
    #[validate(range(min = 1))]
    pub rate_limit_max: u64,

    // --- Conversation history ---
    #[validate(range(min = 1))]
    pub history_ttl_secs: u64,

    // --- Clustering ---
    pub min_questions_to_cluster: usize,
    #[validate(range(min = 2))]
    pub batch_size: usize,
    #[validate(range(min = 1))]
    pub max_batches: usize,
    pub batch_delay_ms: u64,

    #[validate(nested)]
    pub llm: LlmConfig,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 1000,
            min_words: 3,
            gibberish_cutoff: 0.6,
            min_quality_score: 0.3,
            check_gibberish: true,
            check_spam: true,
            check_relevance: true,
            confidence_threshold: 0.6,
            low_confidence_score: 0.6,
            search_min_threshold: 0.3,
            relevance_accept: 0.35,
            relevance_reject: 0.20,
            embedding_cache_ttl_secs: 3600,
            rate_limit_enabled: true,
            rate_limit_window_secs: 300,
            rate_limit_max: 5,
            history_ttl_secs: 1800,
            min_questions_to_cluster: 30,
            batch_size: 30,
            max_batches: 10,
            batch_delay_ms: 2000,
            llm: LlmConfig::default(),
        }
    }
}

fn validate_ranges(cfg: &AssistConfig) -> std::result::Result<(), ValidationError> {
    if cfg.relevance_reject > cfg.relevance_accept {
        return Err(ValidationError::new("relevance_band_inverted"));
    }
    if cfg.min_length > cfg.max_length {
        return Err(ValidationError::new("length_bounds_inverted"));
    }
    Ok(())
}

impl AssistConfig {
    /// Loads defaults, applies `.env` and `FAQ_ASSIST_*` overrides, then validates.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut cfg = Self::default();
        override_from_env("MIN_LENGTH", &mut cfg.min_length)?;
        override_from_env("MAX_LENGTH", &mut cfg.max_length)?;
        override_from_env("MIN_WORDS", &mut cfg.min_words)?;
        override_from_env("GIBBERISH_CUTOFF", &mut cfg.gibberish_cutoff)?;
        override_from_env("MIN_QUALITY_SCORE", &mut cfg.min_quality_score)?;
        override_from_env("CHECK_GIBBERISH", &mut cfg.check_gibberish)?;
        override_from_env("CHECK_SPAM", &mut cfg.check_spam)?;
        override_from_env("CHECK_RELEVANCE", &mut cfg.check_relevance)?;
        override_from_env("CONFIDENCE_THRESHOLD", &mut cfg.confidence_threshold)?;
        override_from_env("LOW_CONFIDENCE_SCORE", &mut cfg.low_confidence_score)?;
        override_from_env("SEARCH_MIN_THRESHOLD", &mut cfg.search_min_threshold)?;
        override_from_env("RELEVANCE_ACCEPT", &mut cfg.relevance_accept)?;
        override_from_env("RELEVANCE_REJECT", &mut cfg.relevance_reject)?;
        override_from_env("EMBEDDING_CACHE_TTL_SECS", &mut cfg.embedding_cache_ttl_secs)?;
        override_from_env("RATE_LIMIT_ENABLED", &mut cfg.rate_limit_enabled)?;
        override_from_env("RATE_LIMIT_WINDOW_SECS", &mut cfg.rate_limit_window_secs)?;
        override_from_env("RATE_LIMIT_MAX", &mut cfg.rate_limit_max)?;
        override_from_env("HISTORY_TTL_SECS", &mut cfg.history_ttl_secs)?;
        override_from_env("MIN_QUESTIONS_TO_CLUSTER", &mut cfg.min_questions_to_cluster)?;
        override_from_env("BATCH_SIZE", &mut cfg.batch_size)?;
        override_from_env("MAX_BATCHES", &mut cfg.max_batches)?;
        override_from_env("BATCH_DELAY_MS", &mut cfg.batch_delay_ms)?;
        override_from_env("LLM_BASE_URL", &mut cfg.llm.base_url)?;
        override_from_env("LLM_TIMEOUT_SECS", &mut cfg.llm.timeout_secs)?;
        override_from_env("LLM_STALL_TIMEOUT_SECS", &mut cfg.llm.stall_timeout_secs)?;

        if let Ok(token) = env::var(format!("{ENV_PREFIX}LLM_AUTH_TOKEN")) {
            if !token.trim().is_empty() {
                cfg.llm.auth_token = Some(token);
            }
        }

        cfg.validate()?;
        info!(
            "Configuration loaded (rate limit {}/{}s, batch {}x{})",
            cfg.rate_limit_max, cfg.rate_limit_window_secs, cfg.max_batches, cfg.batch_size
        );
        Ok(cfg)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn embedding_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.embedding_cache_ttl_secs)
    }
}

fn override_from_env<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let name = format!("{ENV_PREFIX}{key}");
    if let Ok(raw) = env::var(&name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name}={raw:?}: {e}")))?;
    }
    Ok(())
}
