//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval funnel configuration
    pub retrieval: RetrievalConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Generative model configuration
    pub llm: LlmConfig,
}

impl RagConfig {
    /// Load configuration: defaults, then an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(host) = lookup("VERISEARCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VERISEARCH_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid VERISEARCH_PORT '{}': {}", port, e)))?;
        }
        if let Some(dir) = lookup("VERISEARCH_INDEX_DIR") {
            self.vector_db.storage_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("VERISEARCH_RERANKER") {
            self.reranker.enabled = matches!(flag.to_lowercase().as_str(), "1" | "true" | "on");
        }
        if let Some(backend) = lookup("VERISEARCH_EMBEDDER") {
            self.embeddings.backend = match backend.to_lowercase().as_str() {
                "hash" => EmbeddingBackend::Hash,
                "onnx" => EmbeddingBackend::Onnx,
                other => {
                    return Err(Error::Config(format!(
                        "Unknown VERISEARCH_EMBEDDER '{}' (expected hash or onnx)",
                        other
                    )))
                }
            };
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Separators, coarsest first
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Which embedder backs the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing for offline runs and tests
    Hash,
    /// Sentence-transformers model through ONNX Runtime
    #[default]
    Onnx,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedder backend
    pub backend: EmbeddingBackend,
    /// Model to use (default: all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Cache directory for models
    pub cache_dir: PathBuf,
    /// Timeout for a query-time embedding call in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: default_cache_dir().join("embeddings"),
            timeout_secs: 30,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding the serialized index
    pub storage_dir: PathBuf,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    pub hnsw_ef_search: usize,
    /// Expected number of entries; sizes the graph layers
    pub hnsw_max_elements: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("verisearch")
            .join("vector_index");

        Self {
            storage_dir,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            hnsw_max_elements: 100_000,
        }
    }
}

/// Retrieval funnel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Coarse recall depth
    pub coarse_k: usize,
    /// Passages handed to the generator
    pub final_k: usize,
    /// Conversation turns folded into the prompt
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            coarse_k: 10,
            final_k: 5,
            history_turns: 5,
        }
    }
}

/// Cross-encoder reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Load the reranker at startup
    pub enabled: bool,
    /// Cross-encoder model name
    pub model: String,
    /// Cache directory for the model
    pub cache_dir: PathBuf,
    /// Maximum query+passage sequence length
    pub max_length: usize,
    /// Timeout for a rerank call in seconds
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "cross-encoder/ms-marco-MiniLM-L-12-v2".to_string(),
            cache_dir: default_cache_dir().join("reranker"),
            max_length: 512,
            timeout_secs: 20,
        }
    }
}

/// Generative model (Gemini) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key; absent means the mock generator answers
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Generation model name
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout for opening the stream in seconds
    pub timeout_secs: u64,
    /// Maximum silence between streamed fragments in seconds
    pub idle_timeout_secs: u64,
    /// Delay between mock fragments in milliseconds
    pub mock_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            idle_timeout_secs: 60,
            mock_delay_ms: 10,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("verisearch")
}
