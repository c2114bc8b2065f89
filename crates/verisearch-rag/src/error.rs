//! Error types for the RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File extension matches none of the recognized document kinds
    #[error("Unsupported file type: {0}. Supported: PDF, Excel, CSV, PowerPoint, TXT")]
    UnsupportedFormat(String),

    /// Content could not be decoded in its declared kind
    #[error("Failed to parse '{filename}': {message}")]
    ParseFailure { filename: String, message: String },

    /// Malformed request outside the document itself
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Query issued against an index with no entries
    #[error("No documents have been indexed yet")]
    EmptyIndex,

    /// Optional upstream stage (reranker, generator) is down or timed out
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Failure after the response stream started
    #[error("Streaming failed: {0}")]
    StreamingFailure(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorDb(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse failure
    pub fn parse_failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseFailure {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an upstream-unavailable error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller can fix this by changing its input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat(_)
                | Error::ParseFailure { .. }
                | Error::InvalidRequest(_)
                | Error::Json(_)
                | Error::EmptyIndex
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            Error::ParseFailure { .. } => (StatusCode::BAD_REQUEST, "parse_failure"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::EmptyIndex => (StatusCode::CONFLICT, "empty_index"),
            Error::UpstreamUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
            }
            Error::StreamingFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "streaming_failure"),
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::VectorDb(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if self.is_client_error() {
            tracing::warn!(error_type, "Request rejected: {}", self);
        } else {
            tracing::error!(error_type, "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            },
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let response = Error::UnsupportedFormat(".docx".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = Error::parse_failure("a.pdf", "bad xref").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_failure_message_names_file() {
        let err = Error::parse_failure("report.csv", "unterminated quote");
        assert_eq!(
            err.to_string(),
            "Failed to parse 'report.csv': unterminated quote"
        );
        assert!(err.is_client_error());
        assert!(!Error::upstream("gemini down").is_client_error());
    }

    #[test]
    fn test_client_error_matches_status_class() {
        let malformed = serde_json::from_str::<u8>("not json").unwrap_err();
        let errors = [
            Error::InvalidRequest("no file".into()),
            Error::Json(malformed),
            Error::EmptyIndex,
            Error::vector_db("disk full"),
            Error::internal("join failed"),
        ];

        for err in errors {
            let client = err.is_client_error();
            let status = err.into_response().status();
            assert_eq!(client, status.is_client_error(), "{}", status);
        }
    }
}
