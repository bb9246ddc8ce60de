use std::sync::Arc;

use tracing::debug;

use quill_config::RuntimeConfig;
use quill_core::{EmbedRequest, EmbeddingError, ModelProvider, Result};

/// Batched embedding requests over the provider transport.
///
/// One invocation issues exactly one network call regardless of how
/// many texts are passed; the response is validated positionally so a
/// provider that silently drops an input is caught here, not downstream.
pub struct EmbeddingService {
    provider: Arc<dyn ModelProvider>,
    config: Arc<RuntimeConfig>,
}

impl EmbeddingService {
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<RuntimeConfig>) -> Self {
        Self { provider, config }
    }

    /// Embed every text in `texts`, one vector per input, same order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.config.get_embedding_model().to_string(),
            texts: texts.to_vec(),
        };
        let response = self.provider.embed_content(request).await?;

        let embeddings = response.embeddings.ok_or(EmbeddingError::Missing)?;
        if embeddings.is_empty() {
            return Err(EmbeddingError::Missing.into());
        }
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let mut vectors = Vec::with_capacity(embeddings.len());
        for (index, embedding) in embeddings.into_iter().enumerate() {
            if embedding.values.is_empty() {
                return Err(EmbeddingError::Empty {
                    index,
                    text: texts[index].clone(),
                }
                .into());
            }
            vectors.push(embedding.values);
        }

        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }
}
