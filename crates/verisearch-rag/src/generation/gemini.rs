//! Gemini streaming client
//!
//! Calls `streamGenerateContent` with `alt=sse` and forwards each text part
//! as it arrives. Chunks that carry no text (safety blocks, finish markers)
//! are skipped; the caller decides what to say when nothing came through.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AnswerGenerator, FragmentSink, GenerationRequest};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    request_timeout: Duration,
    idle_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl StreamChunk {
    /// Text of the first candidate, empty when the chunk carries none
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    /// Create a client; `None` when no API key is configured
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            request_timeout: Duration::from_secs(config.timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }))
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    async fn open_stream(&self, prompt: &str) -> Result<reqwest::Response> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let send = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.request_timeout, send)
            .await
            .map_err(|_| Error::upstream("Gemini request timed out"))?
            .map_err(|e| Error::upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "Gemini returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl AnswerGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest, sink: &mut FragmentSink) -> Result<()> {
        let prompt = request.prompt();
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Streaming from Gemini");

        let response = self.open_stream(&prompt).await?;
        let mut events = std::pin::pin!(response.bytes_stream().eventsource());

        loop {
            let next = tokio::time::timeout(self.idle_timeout, events.next())
                .await
                .map_err(|_| Error::StreamingFailure("Gemini stream stalled".to_string()))?;

            let Some(event) = next else {
                break;
            };
            let event = event.map_err(|e| Error::StreamingFailure(format!("Stream error: {}", e)))?;

            let payload = event.data.trim();
            if payload.is_empty() || payload == "[DONE]" {
                continue;
            }

            let parsed: StreamChunk = match serde_json::from_str(payload) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Skipping malformed stream chunk: {}", e);
                    continue;
                }
            };

            if let Some(error) = parsed.error {
                return Err(Error::StreamingFailure(error.message));
            }
            if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
                tracing::warn!(reason = %reason, "Gemini blocked the prompt");
            }
            if let Some(reason) = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
                tracing::debug!(reason, "Gemini finish reason");
            }

            sink.push(parsed.text()).await?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
