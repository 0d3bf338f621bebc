use thiserror::Error;

/// Crate-wide error type.
///
/// Input-quality outcomes (too short, spam, off-topic, rate limited...) are
/// never represented here: they are returned as values. Only collaborator and
/// infrastructure failures become an `AppError`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid configuration (e.g., absent credentials).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed data crossing a boundary (config values, JSON payloads).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The LLM service answered with an error or an unusable payload.
    #[error("LLM request failed: {0}")]
    Llm(String),

    /// A persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The embedding backend failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Unexpected internal state, indicates a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("Invalid configuration: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}
