//! VeriSearch server binary
//!
//! Run with: cargo run -p verisearch-rag --bin verisearch-server
//! Set VERISEARCH_CONFIG to a TOML file to override defaults.

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verisearch_rag::{config::RagConfig, server::RagServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verisearch_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var_os("VERISEARCH_CONFIG").map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedder: {:?} ({})", config.embeddings.backend, config.embeddings.model);
    tracing::info!("  - Index directory: {}", config.vector_db.storage_dir.display());
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);
    tracing::info!("  - Reranker enabled: {}", config.reranker.enabled);
    tracing::info!("  - Gemini configured: {}", config.llm.api_key.is_some());

    let server = RagServer::new(config).await?;

    tracing::info!("Endpoints:");
    tracing::info!("  GET  http://{}/health - status probe", server.address());
    tracing::info!("  POST http://{}/ingest - upload a document", server.address());
    tracing::info!("  POST http://{}/chat   - ask a question (SSE)", server.address());

    server.start().await?;

    Ok(())
}
