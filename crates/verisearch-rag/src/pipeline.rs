//! Ingestion and query orchestration
//!
//! Ingestion: parse, chunk, embed, index, persist. Query: coarse recall,
//! optional rerank, context assembly, then a spawned producer streams the
//! answer into a bounded channel that the transport drains.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::RagConfig;
use crate::embeddings::{build_embedder, Embedder};
use crate::error::{Error, Result};
use crate::generation::{
    AnswerGenerator, FragmentSink, GeminiClient, GenerationRequest, MockGenerator, PromptBuilder,
    STREAM_BUFFER,
};
use crate::ingestion::IngestPipeline;
use crate::rerank::{CrossEncoderReranker, Reranker};
use crate::retrieval::IndexService;
use crate::types::{
    ChatRequest, ComponentStatus, IngestResponse, Segment, StatusResponse, StreamEvent,
};

/// Streamed when nothing has been indexed yet
pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents have been indexed yet. Please upload documents first using the Knowledge Base section.";

/// Streamed when the generator finished without producing any text
pub const BLOCKED_MESSAGE: &str = "Response blocked. Try a different question.";

/// Service name reported by the status probe
pub const SERVICE_NAME: &str = "VeriSearch RAG API";

/// The query-path answer stream
pub type AnswerStream = ReceiverStream<StreamEvent>;

/// Composes parser, chunker, index, reranker and generator
pub struct RagPipeline {
    config: RagConfig,
    ingest: IngestPipeline,
    index: IndexService,
    reranker: Option<Arc<dyn Reranker>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    mock: Arc<MockGenerator>,
}

impl RagPipeline {
    /// Assemble a pipeline from explicit components
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        generator: Option<Arc<dyn AnswerGenerator>>,
    ) -> Result<Self> {
        let index = IndexService::open(
            embedder,
            &config.vector_db,
            Duration::from_secs(config.embeddings.timeout_secs),
        )?;

        Ok(Self {
            ingest: IngestPipeline::new(&config.chunking),
            mock: Arc::new(MockGenerator::new(Duration::from_millis(
                config.llm.mock_delay_ms,
            ))),
            config,
            index,
            reranker,
            generator,
        })
    }

    /// Resolve every optional capability once, from configuration
    pub async fn from_config(config: RagConfig) -> Result<Self> {
        let embedder = build_embedder(&config.embeddings).await?;

        let reranker: Option<Arc<dyn Reranker>> = if config.reranker.enabled {
            match CrossEncoderReranker::new(&config.reranker).await {
                Ok(reranker) => Some(Arc::new(reranker)),
                Err(e) => {
                    tracing::warn!("Reranker unavailable, using coarse ranking: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let generator: Option<Arc<dyn AnswerGenerator>> = match GeminiClient::from_config(&config.llm)? {
            Some(client) => Some(Arc::new(client)),
            None => {
                tracing::warn!("No Gemini API key configured, answers will be mocked");
                None
            }
        };

        Self::new(config, embedder, reranker, generator)
    }

    pub fn index(&self) -> &IndexService {
        &self.index
    }

    /// Parse, chunk, embed and index one upload
    ///
    /// The index is persisted on every exit path.
    pub async fn ingest(&self, filename: &str, data: Bytes) -> Result<IngestResponse> {
        tracing::info!(filename, bytes = data.len(), "Ingesting file");

        let ingest = self.ingest.clone();
        let name = filename.to_string();
        let prepared = tokio::task::spawn_blocking(move || ingest.prepare(&name, &data))
            .await
            .map_err(|e| Error::internal(format!("Parse task failed: {}", e)))
            .and_then(|r| r);

        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(filename, "Ingestion failed: {}", e);
                if let Err(persist_err) = self.index.persist().await {
                    tracing::error!("Failed to persist index: {}", persist_err);
                }
                return Err(e);
            }
        };

        let doc_id = prepared.doc_id;
        let added = self.index.insert(prepared.chunks).await.map_err(|e| {
            tracing::error!(filename, "Indexing failed: {}", e);
            e
        })?;

        tracing::info!(
            filename,
            %doc_id,
            chunks = added,
            total = self.index.len(),
            "Indexed document"
        );

        Ok(IngestResponse::success(doc_id, filename, added))
    }

    /// Coarse recall followed by rerank, or the coarse order as fallback
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Segment>> {
        let hits = self.index.query(query, self.config.retrieval.coarse_k).await?;
        tracing::debug!(retrieved = hits.len(), "Coarse recall");

        let candidates: Vec<Segment> = hits.into_iter().map(|h| h.segment).collect();
        Ok(self.rank(query, candidates).await)
    }

    async fn rank(&self, query: &str, mut candidates: Vec<Segment>) -> Vec<Segment> {
        let final_k = self.config.retrieval.final_k;

        let Some(reranker) = &self.reranker else {
            candidates.truncate(final_k);
            return candidates;
        };

        let timeout = Duration::from_secs(self.config.reranker.timeout_secs);
        match tokio::time::timeout(timeout, reranker.rerank(query, &candidates)).await {
            Ok(Ok(order)) => {
                let mut taken = vec![false; candidates.len()];
                let reranked: Vec<Segment> = order
                    .into_iter()
                    .filter(|r| match taken.get_mut(r.index) {
                        Some(slot) if !*slot => {
                            *slot = true;
                            true
                        }
                        _ => false,
                    })
                    .take(final_k)
                    .map(|r| candidates[r.index].clone())
                    .collect();
                tracing::debug!(kept = reranked.len(), "Reranked candidates");
                reranked
            }
            Ok(Err(e)) => {
                tracing::warn!("Rerank failed, using coarse order: {}", e);
                candidates.truncate(final_k);
                candidates
            }
            Err(_) => {
                tracing::warn!("Rerank timed out, using coarse order");
                candidates.truncate(final_k);
                candidates
            }
        }
    }

    /// Answer a question as a stream of events
    ///
    /// Failures before the stream opens are returned as errors; afterwards
    /// they arrive in-band as an error event followed by done.
    pub async fn chat(&self, request: ChatRequest) -> Result<AnswerStream> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        if self.index.is_empty() {
            tracing::warn!("Chat requested with no documents indexed");
            tokio::spawn(async move {
                let sink = FragmentSink::new(tx);
                let _ = sink.send(StreamEvent::Content(NO_DOCUMENTS_MESSAGE.to_string())).await;
                let _ = sink.send(StreamEvent::Done).await;
            });
            return Ok(ReceiverStream::new(rx));
        }

        let passages = self.retrieve(&request.message).await?;
        let context = PromptBuilder::build_context(&passages);
        tracing::info!(
            passages = passages.len(),
            context_chars = context.len(),
            "Context assembled"
        );

        let generation = GenerationRequest {
            question: request.message.clone(),
            context,
            history: request
                .recent_history(self.config.retrieval.history_turns)
                .to_vec(),
        };

        let generator: Arc<dyn AnswerGenerator> = match &self.generator {
            Some(generator) => Arc::clone(generator),
            None => self.mock.clone() as Arc<dyn AnswerGenerator>,
        };

        tokio::spawn(stream_answer(generator, generation, tx));
        Ok(ReceiverStream::new(rx))
    }

    /// Index size and active capabilities
    pub fn status(&self) -> StatusResponse {
        let index = self.index.snapshot();
        StatusResponse {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            components: ComponentStatus {
                embeddings: index.model_id().to_string(),
                vector_db: "hnsw".to_string(),
                reranker: self
                    .reranker
                    .as_ref()
                    .map(|r| r.name().to_string())
                    .unwrap_or_else(|| "coarse".to_string()),
                llm: self
                    .generator
                    .as_ref()
                    .map(|g| g.name().to_string())
                    .unwrap_or_else(|| self.mock.name().to_string()),
                reranker_active: self.reranker.is_some(),
                gemini_configured: self.generator.is_some(),
            },
            documents_indexed: index.len(),
        }
    }
}

/// Drive one generator into the channel and close with done
async fn stream_answer(
    generator: Arc<dyn AnswerGenerator>,
    request: GenerationRequest,
    tx: mpsc::Sender<StreamEvent>,
) {
    let mut sink = FragmentSink::new(tx);
    let result = generator.generate(&request, &mut sink).await;

    if sink.is_closed() {
        tracing::debug!(
            fragments = sink.fragments_sent(),
            "Stream consumer disconnected, generation stopped"
        );
        return;
    }

    match result {
        Ok(()) if sink.fragments_sent() == 0 => {
            tracing::warn!(generator = generator.name(), "Generator produced no text");
            let _ = sink.push(BLOCKED_MESSAGE).await;
        }
        Ok(()) => {
            tracing::info!(fragments = sink.fragments_sent(), "Streaming completed");
        }
        Err(e) => {
            tracing::error!(generator = generator.name(), "Streaming error: {}", e);
            let _ = sink
                .send(StreamEvent::Error(format!("Error generating response: {}", e)))
                .await;
        }
    }

    let _ = sink.send(StreamEvent::Done).await;
}
