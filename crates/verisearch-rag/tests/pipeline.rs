//! End-to-end pipeline behavior with deterministic embeddings and test doubles

mod common;

use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use verisearch_rag::generation::{MOCK_RESPONSE, PASSAGE_DELIMITER};
use verisearch_rag::pipeline::{BLOCKED_MESSAGE, NO_DOCUMENTS_MESSAGE};
use verisearch_rag::{ChatMessage, ChatRequest, Error, Locator, StreamEvent};

#[tokio::test]
async fn test_pdf_blank_page_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), None, None);

    let pdf = build_pdf(&["Revenue grew in March.", "", "Outlook is stable."]);
    let response = pipeline.ingest("q1.pdf", Bytes::from(pdf)).await.unwrap();

    assert_eq!(response.status, "success");
    assert_eq!(response.chunks_processed, 2);

    let index = pipeline.index().snapshot();
    let locators: Vec<&Locator> = index
        .entries()
        .iter()
        .map(|e| &e.segment.source().locator)
        .collect();
    assert_eq!(
        locators,
        vec![&Locator::Page { number: 1 }, &Locator::Page { number: 3 }]
    );
    assert_eq!(index.entries()[1].segment.label(), "q1.pdf - Page 3");
    assert!(index
        .entries()
        .iter()
        .all(|e| e.segment.doc_id() == response.doc_id));
}

#[tokio::test]
async fn test_empty_index_streams_no_documents_message() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(Script::Fragments(vec!["unused"])));
    let pipeline = pipeline(dir.path(), None, Some(generator.clone()));

    let events = collect(pipeline.chat(ChatRequest::new("anything?")).await.unwrap()).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Content(NO_DOCUMENTS_MESSAGE.to_string()),
            StreamEvent::Done
        ]
    );
    assert!(generator.requests.lock().is_empty());
}

#[tokio::test]
async fn test_reranker_keeps_five_passages_in_rerank_order() {
    let dir = tempfile::tempdir().unwrap();
    let reranker = Arc::new(ReversingReranker::default());
    let generator = Arc::new(ScriptedGenerator::new(Script::Fragments(vec!["ok"])));
    let pipeline = pipeline(dir.path(), Some(reranker.clone()), Some(generator.clone()));

    let ingested = pipeline
        .ingest("products.csv", Bytes::from(warranty_csv(12)))
        .await
        .unwrap();
    assert_eq!(ingested.chunks_processed, 12);

    let query = "warranty coverage";
    let coarse = pipeline.index().query(query, 10).await.unwrap();
    let expected: Vec<String> = coarse
        .iter()
        .rev()
        .take(5)
        .map(|h| format!("[Source: {}]\n{}", h.segment.label(), h.segment.text()))
        .collect();

    let events = collect(pipeline.chat(ChatRequest::new(query)).await.unwrap()).await;
    assert_eq!(
        events,
        vec![StreamEvent::Content("ok".into()), StreamEvent::Done]
    );

    assert_eq!(reranker.seen.load(Ordering::SeqCst), 10);
    let request = generator.last_request();
    let passages: Vec<&str> = request.context.split(PASSAGE_DELIMITER).collect();
    assert_eq!(passages.len(), 5);
    assert_eq!(passages, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_without_reranker_uses_coarse_top_five() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), None, None);
    pipeline
        .ingest("products.csv", Bytes::from(warranty_csv(12)))
        .await
        .unwrap();

    for query in ["warranty coverage", "region 2", "Model 7"] {
        let coarse = pipeline.index().query(query, 10).await.unwrap();
        let expected: Vec<_> = coarse.into_iter().take(5).map(|h| h.segment).collect();
        assert_eq!(pipeline.retrieve(query).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_failing_reranker_falls_back_to_coarse_order() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), Some(Arc::new(FailingReranker)), None);
    pipeline
        .ingest("products.csv", Bytes::from(warranty_csv(12)))
        .await
        .unwrap();

    let coarse = pipeline.index().query("warranty", 10).await.unwrap();
    let expected: Vec<_> = coarse.into_iter().take(5).map(|h| h.segment).collect();
    assert_eq!(pipeline.retrieve("warranty").await.unwrap(), expected);
}

#[tokio::test]
async fn test_no_credentials_streams_mock_message() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), None, None);
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"The office opens at nine."))
        .await
        .unwrap();

    let events = collect(pipeline.chat(ChatRequest::new("When does it open?")).await.unwrap()).await;

    let (last, content) = events.split_last().unwrap();
    assert_eq!(last, &StreamEvent::Done);
    assert_eq!(content.len(), MOCK_RESPONSE.chars().count());

    let text: String = content
        .iter()
        .map(|e| match e {
            StreamEvent::Content(c) => c.as_str(),
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(text, MOCK_RESPONSE);
}

#[tokio::test]
async fn test_generation_failure_is_in_band() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(Script::FailAfter(
        vec!["Partial "],
        "connection reset",
    )));
    let pipeline = pipeline(dir.path(), None, Some(generator));
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"Some indexed text."))
        .await
        .unwrap();

    let events = collect(pipeline.chat(ChatRequest::new("q")).await.unwrap()).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Content("Partial ".into()));
    match &events[1] {
        StreamEvent::Error(message) => {
            assert!(message.starts_with("Error generating response:"));
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected error event, got {:?}", other),
    }
    assert_eq!(events[2], StreamEvent::Done);
}

#[tokio::test]
async fn test_empty_generation_yields_blocked_message() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(Script::Fragments(vec![""])));
    let pipeline = pipeline(dir.path(), None, Some(generator));
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"Some indexed text."))
        .await
        .unwrap();

    let events = collect(pipeline.chat(ChatRequest::new("q")).await.unwrap()).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Content(BLOCKED_MESSAGE.to_string()),
            StreamEvent::Done
        ]
    );
}

#[tokio::test]
async fn test_history_is_truncated_to_recent_turns() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(Script::Fragments(vec!["ok"])));
    let pipeline = pipeline(dir.path(), None, Some(generator.clone()));
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"Parking is behind the building."))
        .await
        .unwrap();

    let history: Vec<ChatMessage> = (0..8)
        .map(|i| {
            if i % 2 == 0 {
                ChatMessage::user(format!("question {}", i))
            } else {
                ChatMessage::assistant(format!("answer {}", i))
            }
        })
        .collect();
    let request = ChatRequest::new("Where is parking?").with_history(history.clone());
    collect(pipeline.chat(request).await.unwrap()).await;

    let recorded = generator.last_request();
    assert_eq!(recorded.history, history[3..].to_vec());
    assert!(recorded.prompt().contains("USER: question 4"));
    assert!(!recorded.prompt().contains("question 2"));
}

#[tokio::test]
async fn test_consumer_disconnect_stops_generation() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(EndlessGenerator::default());
    let pipeline = pipeline(dir.path(), None, Some(generator.clone()));
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"Some indexed text."))
        .await
        .unwrap();

    let stream = pipeline.chat(ChatRequest::new("q")).await.unwrap();
    drop(stream);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stopped_at = generator.delivered.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(generator.delivered.load(Ordering::SeqCst), stopped_at);
    assert!(stopped_at < 10_000);
}

#[tokio::test]
async fn test_index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let before = {
        let pipeline = pipeline(dir.path(), None, None);
        pipeline
            .ingest("products.csv", Bytes::from(warranty_csv(12)))
            .await
            .unwrap();
        pipeline
            .ingest("q1.pdf", Bytes::from(build_pdf(&["Revenue grew.", "Costs fell."])))
            .await
            .unwrap();
        pipeline.retrieve("warranty region 1").await.unwrap()
    };

    let reopened = pipeline(dir.path(), None, None);
    assert_eq!(reopened.index().len(), 14);
    assert_eq!(reopened.retrieve("warranty region 1").await.unwrap(), before);
}

#[tokio::test]
async fn test_rejected_upload_leaves_index_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), None, None);
    pipeline
        .ingest("notes.txt", Bytes::from_static(b"Kept content."))
        .await
        .unwrap();

    let err = pipeline
        .ingest("slides.key", Bytes::from_static(b"whatever"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(ref ext) if ext == ".key"));

    let err = pipeline
        .ingest("broken.pdf", Bytes::from_static(b"%PDF-garbage"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ParseFailure { .. }));

    assert_eq!(pipeline.index().len(), 1);
    assert_eq!(pipeline.status().documents_indexed, 1);
}

#[tokio::test]
async fn test_status_reports_optional_stages() {
    let dir = tempfile::tempdir().unwrap();
    let bare = pipeline(dir.path(), None, None).status();
    assert!(!bare.components.reranker_active);
    assert!(!bare.components.gemini_configured);
    assert_eq!(bare.components.llm, "mock");
    assert_eq!(bare.documents_indexed, 0);

    let dir = tempfile::tempdir().unwrap();
    let full = pipeline(
        dir.path(),
        Some(Arc::new(ReversingReranker::default())),
        Some(Arc::new(ScriptedGenerator::new(Script::Fragments(vec![])))),
    )
    .status();
    assert!(full.components.reranker_active);
    assert!(full.components.gemini_configured);
    assert_eq!(full.components.reranker, "reversing");
}
