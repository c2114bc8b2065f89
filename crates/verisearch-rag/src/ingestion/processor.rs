//! Ingestion pipeline: parse then chunk

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{DocumentKind, Segment};

use super::chunker::TextChunker;
use super::parser::FileParser;

/// Chunked output of one upload, ready for embedding
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Batch id shared by all chunks
    pub doc_id: Uuid,
    /// Detected kind
    pub kind: DocumentKind,
    /// Segments straight from the parser
    pub sections: usize,
    /// Chunks to index, in document order
    pub chunks: Vec<Segment>,
}

/// Parse-and-chunk stage of ingestion
#[derive(Debug, Clone, Default)]
pub struct IngestPipeline {
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunker: TextChunker::from_config(config),
        }
    }

    /// Parse and chunk one upload under a fresh batch id
    pub fn prepare(&self, filename: &str, data: &[u8]) -> Result<PreparedDocument> {
        let kind = FileParser::detect(filename)?;
        let doc_id = Uuid::new_v4();

        let segments = FileParser::parse(data, filename, kind, doc_id)?;
        if segments.is_empty() {
            return Err(Error::parse_failure(
                filename,
                "No content could be extracted from the file",
            ));
        }

        let chunks = self.chunker.split_all(&segments);
        tracing::info!(
            filename,
            sections = segments.len(),
            chunks = chunks.len(),
            "Chunked document"
        );

        Ok(PreparedDocument {
            doc_id,
            kind,
            sections: segments.len(),
            chunks,
        })
    }
}
