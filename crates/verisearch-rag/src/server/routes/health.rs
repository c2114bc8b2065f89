//! Status probe endpoint

use axum::{extract::State, Json};

use crate::server::state::AppState;
use crate::types::StatusResponse;

/// GET /health - index size and active optional stages
pub async fn health_check(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.pipeline().status())
}
