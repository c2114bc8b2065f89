//! Streaming answer generation

mod gemini;
mod mock;
mod prompt;
mod sink;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

pub use gemini::GeminiClient;
pub use mock::{MockGenerator, MOCK_RESPONSE};
pub use prompt::{PromptBuilder, PASSAGE_DELIMITER};
pub use sink::{FragmentSink, STREAM_BUFFER};

/// Inputs for one grounded answer
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The user's question
    pub question: String,
    /// Assembled context passages
    pub context: String,
    /// Recent turns, oldest first, already truncated
    pub history: Vec<ChatMessage>,
}

impl GenerationRequest {
    /// Full prompt text
    pub fn prompt(&self) -> String {
        PromptBuilder::build_rag_prompt(&self.question, &self.context, &self.history)
    }
}

/// Produces answer text incrementally
///
/// Implementations push each fragment into the sink as soon as it is
/// available and return when the upstream is exhausted. An `Err` after some
/// fragments were pushed leaves those fragments delivered.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest, sink: &mut FragmentSink) -> Result<()>;

    /// Short name for logs and the status probe
    fn name(&self) -> &str;
}
