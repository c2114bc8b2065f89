//! Response types for ingestion, chat streaming and status

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response from document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Batch id shared by every segment of this upload
    pub doc_id: Uuid,
    /// Uploaded filename
    pub filename: String,
    /// Number of indexed chunks
    pub chunks_processed: usize,
    /// Always "success"; failures are reported as errors
    pub status: String,
    /// Human-readable summary
    pub message: String,
}

impl IngestResponse {
    /// Successful ingestion summary
    pub fn success(doc_id: Uuid, filename: impl Into<String>, chunks_processed: usize) -> Self {
        let filename = filename.into();
        Self {
            doc_id,
            message: format!(
                "Successfully processed {} chunks from {}",
                chunks_processed, filename
            ),
            filename,
            chunks_processed,
            status: "success".to_string(),
        }
    }
}

/// One event of the chat response stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A fragment of answer text
    Content(String),
    /// Terminal failure message
    Error(String),
    /// End of stream
    Done,
}

/// Which optional stages are active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Embedding model id
    pub embeddings: String,
    /// Coarse index description
    pub vector_db: String,
    /// Reranker name, or "coarse" when reranking is off
    pub reranker: String,
    /// Generator name
    pub llm: String,
    /// Whether a cross-encoder reranker is loaded
    pub reranker_active: bool,
    /// Whether generator credentials are configured
    pub gemini_configured: bool,
}

/// Status probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub components: ComponentStatus,
    /// Number of index entries
    pub documents_indexed: usize,
}
