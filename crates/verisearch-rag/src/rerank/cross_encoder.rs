//! ONNX cross-encoder reranker (ms-marco MiniLM by default)

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use super::{rank_scores, RankedIndex, Reranker};
use crate::config::RerankerConfig;
use crate::embeddings::{fetch_model_file, hub_repo, load_session};
use crate::error::{Error, Result};
use crate::types::Segment;

/// Scores query/passage pairs jointly with a sequence-classification model
pub struct CrossEncoderReranker {
    inner: Arc<Inner>,
    name: String,
}

struct Inner {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl CrossEncoderReranker {
    /// Load the configured model, downloading it on first use
    pub async fn new(config: &RerankerConfig) -> Result<Self> {
        let repo = hub_repo(&config.model, "cross-encoder");
        tracing::info!(model = %repo, "Initializing cross-encoder reranker");

        let model_dir = config.cache_dir.join(repo.replace('/', "--"));
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        fetch_model_file(&repo, "onnx/model.onnx", &model_path).await?;
        fetch_model_file(&repo, "tokenizer.json", &tokenizer_path).await?;

        let session = load_session(&model_path)?;
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::embedding(format!("Failed to configure truncation: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                tokenizer,
            }),
            name: repo,
        })
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, candidates: &[Segment]) -> Result<Vec<RankedIndex>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let inner = Arc::clone(&self.inner);
        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|c| (query.to_string(), c.text().to_string()))
            .collect();

        let scores = tokio::task::spawn_blocking(move || inner.score(pairs))
            .await
            .map_err(|e| Error::internal(format!("Rerank task failed: {}", e)))??;

        Ok(rank_scores(&scores))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Inner {
    /// One relevance logit per pair
    fn score(&self, pairs: Vec<(String, String)>) -> Result<Vec<f32>> {
        let batch_size = pairs.len();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * max_len;
            for (j, ((&id, &mask), &ty)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = mask as i64;
                token_type_ids[row + j] = ty as i64;
            }
        }

        let shape = vec![batch_size, max_len];
        let inputs = vec![
            (
                "input_ids",
                Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
                    .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?
                    .into_dyn(),
            ),
            (
                "attention_mask",
                Tensor::from_array((shape.clone(), attention_mask.into_boxed_slice()))
                    .map_err(|e| Error::embedding(format!("Attention mask tensor failed: {}", e)))?
                    .into_dyn(),
            ),
            (
                "token_type_ids",
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                    .map_err(|e| Error::embedding(format!("Token type tensor failed: {}", e)))?
                    .into_dyn(),
            ),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Rerank inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let logits = output_iter
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (_, data) = logits
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract logits: {}", e)))?;

        // Shape [batch, 1]: one logit per row
        let per_row = (data.len() / batch_size).max(1);
        Ok((0..batch_size)
            .map(|i| data.get(i * per_row).copied().unwrap_or(f32::NEG_INFINITY))
            .collect())
    }
}
