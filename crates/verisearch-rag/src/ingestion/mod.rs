//! Document ingestion: multi-format parsing and chunking

mod chunker;
mod parser;
mod processor;

pub use chunker::TextChunker;
pub use parser::FileParser;
pub use processor::{IngestPipeline, PreparedDocument};
