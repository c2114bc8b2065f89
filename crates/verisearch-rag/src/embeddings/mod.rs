//! Text embedding backends
//!
//! Every backend produces unit-length vectors of a fixed dimension and is
//! deterministic: the same text under the same model yields bit-identical
//! output, so persisted indexes stay queryable after a reload.

mod hash_embedder;
mod onnx_embedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{Error, Result};

pub use hash_embedder::HashEmbedder;
pub use onnx_embedder::OnnxEmbedder;
pub(crate) use onnx_embedder::{fetch_model_file, hub_repo, load_session};

/// Trait for generating text embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, one vector per input in the same order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    /// Vector dimension
    fn dimensions(&self) -> usize;

    /// Identifier stored alongside persisted indexes
    fn model_id(&self) -> &str;
}

/// Build the configured embedder
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.dimensions)),
        EmbeddingBackend::Onnx => Arc::new(OnnxEmbedder::new(config).await?),
    };

    tracing::info!(
        model = embedder.model_id(),
        dimensions = embedder.dimensions(),
        "Embedder ready"
    );

    Ok(embedder)
}

/// Scale a vector to unit length in place; zero vectors are left as-is
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
