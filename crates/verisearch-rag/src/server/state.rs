//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::RagPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
}

impl AppState {
    /// Create new application state, resolving optional stages from config
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");
        let pipeline = RagPipeline::from_config(config).await?;
        tracing::info!(
            documents = pipeline.index().len(),
            "RAG pipeline ready"
        );
        Ok(Self::from_pipeline(pipeline))
    }

    /// Wrap an already assembled pipeline
    pub fn from_pipeline(pipeline: RagPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Get the pipeline
    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }
}
