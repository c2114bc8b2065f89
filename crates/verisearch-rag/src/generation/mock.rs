//! Credential-free generator
//!
//! Streams a fixed message one character at a time so the full pipeline can
//! be exercised without a live model.

use async_trait::async_trait;
use std::time::Duration;

use super::{AnswerGenerator, FragmentSink, GenerationRequest};
use crate::error::Result;

/// Message streamed when no generator credentials are configured
pub const MOCK_RESPONSE: &str = "Based on the retrieved documents, I can provide information about your query. However, no API key is configured, so this is a mock response for demonstration purposes.";

/// Deterministic character-by-character generator
#[derive(Debug, Clone)]
pub struct MockGenerator {
    delay: Duration,
}

impl MockGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    async fn generate(&self, _request: &GenerationRequest, sink: &mut FragmentSink) -> Result<()> {
        for ch in MOCK_RESPONSE.chars() {
            sink.push(ch.to_string()).await?;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
