//! Core types for the RAG pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{DocumentKind, KindDetection, Locator, Segment, SourceMetadata};
pub use query::{ChatMessage, ChatRequest, Role};
pub use response::{ComponentStatus, IngestResponse, StatusResponse, StreamEvent};
