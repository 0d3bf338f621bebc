//! HTTP client for a llama.cpp-compatible `/completion` endpoint.

use crate::config::LlmConfig;
use crate::error::{AppError, Result};
use crate::services::traits::{Completion, CompletionOptions, FinishReason, LlmClient, NullLlm};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, instrument};
use url::Url;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stopped_limit: bool,
}

/// Talks to the completion server over HTTP with bearer authentication.
///
/// Two timeouts apply: one for the whole request and one for the gap
/// between two body chunks, so a stalled server fails fast.
pub struct HttpLlmClient {
    client: Client,
    endpoint: Url,
    auth_token: String,
    timeout: Duration,
    stall_timeout: Duration,
}

impl HttpLlmClient {
    /// Fails with a config error when no auth token is set.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let auth_token = match config.auth_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                let msg = "LLM auth token is not set; refusing to talk to an unauthenticated completion server";
                error!("{}", msg);
                return Err(AppError::Config(msg.to_string()));
            }
        };

        let mut base = Url::parse(&config.base_url)?;
        // `join` replaces the last segment unless the path ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("completion")?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            auth_token,
            timeout: config.timeout(),
            stall_timeout: config.stall_timeout(),
        })
    }

    async fn send_and_read(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        let res = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "Completion request failed with status {}: {}",
                status, body
            )));
        }

        let mut body = Vec::new();
        let mut stream = res.bytes_stream();
        loop {
            match timeout(self.stall_timeout, stream.next()).await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk?),
                Ok(None) => break,
                Err(_) => {
                    return Err(AppError::Timeout(format!(
                        "completion server sent nothing for {:?}",
                        self.stall_timeout
                    )))
                }
            }
        }

        let parsed: CompletionResponse = serde_json::from_slice(&body)
            .map_err(|e| AppError::Llm(format!("Unreadable completion payload: {}", e)))?;

        Ok(Completion {
            text: parsed.content,
            finish_reason: if parsed.stopped_limit {
                FinishReason::MaxTokens
            } else {
                FinishReason::Stop
            },
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<Completion> {
        let request = CompletionRequest {
            prompt,
            n_predict: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        let completion = timeout(self.timeout, self.send_and_read(&request)).await??;
        debug!(
            chars = completion.text.len(),
            truncated = completion.is_truncated(),
            "Completion received"
        );
        Ok(completion)
    }
}

/// Builds the HTTP client, or falls back to [`NullLlm`] when it cannot be
/// configured. LLM-backed steps then degrade instead of failing.
pub fn llm_from_config(config: &LlmConfig) -> Arc<dyn LlmClient> {
    match HttpLlmClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(_) => Arc::new(NullLlm),
    }
}

/// Parses the first JSON object in a model reply, ignoring markdown fences
/// and any prose around it.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let start = unfenced.find('{');
    let end = unfenced.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            Ok(serde_json::from_str(&unfenced[start..=end])?)
        }
        _ => Err(AppError::Llm(
            "Model reply does not contain a JSON object".to_string(),
        )),
    }
}
