//! Streaming chat endpoint

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use std::convert::Infallible;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ChatRequest, StreamEvent};

/// POST /chat - answer as server-sent events, one JSON event per `data:` line
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    let preview: String = request.message.chars().take(100).collect();
    tracing::info!(query = %preview, history = request.history.len(), "Chat query");

    let answer = state.pipeline().chat(request).await?;
    let events = answer.map(|event| Ok::<_, Infallible>(to_sse(&event)));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    Ok(response)
}

fn to_sse(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => Event::default().data(format!(
            r#"{{"type":"error","data":"Failed to encode event: {}"}}"#,
            e
        )),
    }
}
