//! verisearch-rag: retrieval-augmented question answering over private documents
//!
//! Uploaded PDF, spreadsheet, CSV, slide-deck and text files are parsed into
//! provenance-tagged segments, chunked, embedded and stored in an HNSW index.
//! Questions run coarse vector recall, an optional cross-encoder rerank, and
//! a streamed, citation-grounded answer from Gemini (or a mock generator when
//! no credentials are configured).

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::RagPipeline;
pub use types::{
    document::{DocumentKind, Locator, Segment, SourceMetadata},
    query::{ChatMessage, ChatRequest},
    response::{IngestResponse, StatusResponse, StreamEvent},
};
