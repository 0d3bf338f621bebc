//! Local text embeddings through FastEmbed (AllMiniLML6V2).

use crate::error::{AppError, Result};
use crate::services::traits::EmbeddingProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
}

impl FastEmbedProvider {
    /// Loads the model, downloading it into `cache_dir` on first use.
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
        options.show_download_progress = false;
        options.cache_dir = cache_dir;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| AppError::Embedding(format!("Failed to load embedding model: {}", e)))?;
        info!("Embedding model loaded successfully");

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        // Inference is CPU-bound.
        let result = tokio::task::spawn_blocking(move || model.embed(vec![text], None)).await;

        match result {
            Ok(Ok(mut embeddings)) if !embeddings.is_empty() => Some(embeddings.swap_remove(0)),
            Ok(Ok(_)) => {
                warn!("Embedding model returned no vector");
                None
            }
            Ok(Err(e)) => {
                warn!("Embedding failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Embedding task panicked: {}", e);
                None
            }
        }
    }
}
