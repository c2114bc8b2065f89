//! HTTP surface: routes, status codes and the SSE body

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::*;
use verisearch_rag::pipeline::NO_DOCUMENTS_MESSAGE;
use verisearch_rag::server::{build_router, state::AppState};

const BOUNDARY: &str = "verisearch-test-boundary";

fn router(dir: &std::path::Path) -> Router {
    let config = test_config(dir);
    let state = AppState::from_pipeline(pipeline(dir, None, None));
    build_router(state, &config.server)
}

fn multipart_upload(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/ingest")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn chat_request(message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": message, "history": [] }).to_string(),
        ))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The JSON payloads of every `data:` line
async fn sse_events(response: axum::response::Response) -> Vec<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_reports_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(dir.path())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["documents_indexed"], 0);
    assert_eq!(body["components"]["reranker_active"], false);
}

#[tokio::test]
async fn test_chat_on_empty_index_streams_notice() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(dir.path())
        .oneshot(chat_request("What is covered?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let events = sse_events(response).await;
    assert_eq!(
        events,
        vec![
            serde_json::json!({"type": "content", "data": NO_DOCUMENTS_MESSAGE}),
            serde_json::json!({"type": "done"}),
        ]
    );
}

#[tokio::test]
async fn test_unsupported_upload_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(dir.path())
        .oneshot(multipart_upload("report.docx", b"PK\x03\x04"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body.to_string().contains(".docx"));
}

#[tokio::test]
async fn test_text_upload_then_chat() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path());

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "handbook.txt",
            b"Employees receive twenty days of paid leave each year.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["filename"], "handbook.txt");
    assert_eq!(body["chunks_processed"], 1);

    let health = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(health).await["documents_indexed"], 1);

    let events = sse_events(app.oneshot(chat_request("How much leave?")).await.unwrap()).await;
    assert_eq!(events.last(), Some(&serde_json::json!({"type": "done"})));
    assert!(events[..events.len() - 1]
        .iter()
        .all(|e| e["type"] == "content"));
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = router(dir.path()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
