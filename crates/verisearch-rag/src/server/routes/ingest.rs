//! Document ingestion endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::IngestResponse;

/// Multipart field carrying the upload
const FILE_FIELD: &str = "file";

/// POST /ingest - upload and index one file
pub async fn ingest_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidRequest("Upload has no filename".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::internal(format!("Failed to read file: {}", e)))?;

        let response = state.pipeline().ingest(&filename, data).await?;
        tracing::info!(
            filename = %response.filename,
            chunks = response.chunks_processed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upload processed"
        );
        return Ok(Json(response));
    }

    Err(Error::InvalidRequest(format!(
        "Multipart body has no '{}' field",
        FILE_FIELD
    )))
}
