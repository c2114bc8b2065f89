//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use verisearch_rag::config::EmbeddingBackend;
use verisearch_rag::embeddings::HashEmbedder;
use verisearch_rag::generation::{AnswerGenerator, FragmentSink, GenerationRequest};
use verisearch_rag::pipeline::AnswerStream;
use verisearch_rag::rerank::{RankedIndex, Reranker};
use verisearch_rag::{Error, RagConfig, RagPipeline, Result, Segment, StreamEvent};

pub const DIMS: usize = 128;

/// Offline config pointing the index at `dir`, with no mock delay
pub fn test_config(dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.vector_db.storage_dir = dir.to_path_buf();
    config.embeddings.backend = EmbeddingBackend::Hash;
    config.embeddings.dimensions = DIMS;
    config.reranker.enabled = false;
    config.llm.mock_delay_ms = 0;
    config.reranker.timeout_secs = 2;
    config
}

pub fn pipeline(
    dir: &Path,
    reranker: Option<Arc<dyn Reranker>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
) -> RagPipeline {
    RagPipeline::new(
        test_config(dir),
        Arc::new(HashEmbedder::new(DIMS)),
        reranker,
        generator,
    )
    .unwrap()
}

pub async fn collect(stream: AnswerStream) -> Vec<StreamEvent> {
    tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("stream did not finish")
}

/// PDF with one text line per page; empty strings make blank pages
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// CSV whose every row mentions the warranty
pub fn warranty_csv(rows: usize) -> Vec<u8> {
    let mut csv = String::from("product,note\n");
    for i in 0..rows {
        csv.push_str(&format!(
            "Model {},warranty coverage detail number {} for region {}\n",
            i,
            i,
            i % 3
        ));
    }
    csv.into_bytes()
}

/// Reverses the coarse order and records how many candidates it saw
#[derive(Default)]
pub struct ReversingReranker {
    pub seen: AtomicUsize,
}

#[async_trait]
impl Reranker for ReversingReranker {
    async fn rerank(&self, _query: &str, candidates: &[Segment]) -> Result<Vec<RankedIndex>> {
        self.seen.store(candidates.len(), Ordering::SeqCst);
        let n = candidates.len();
        Ok((0..n)
            .map(|i| RankedIndex {
                index: n - 1 - i,
                score: (n - i) as f32,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "reversing"
    }
}

pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(&self, _query: &str, _candidates: &[Segment]) -> Result<Vec<RankedIndex>> {
        Err(Error::upstream("reranker offline"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Behavior of the scripted generator
pub enum Script {
    /// Push these fragments, then finish
    Fragments(Vec<&'static str>),
    /// Push these fragments, then fail
    FailAfter(Vec<&'static str>, &'static str),
}

/// Records every request and plays back a script
pub struct ScriptedGenerator {
    script: Script,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.requests.lock().last().cloned().expect("no request recorded")
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest, sink: &mut FragmentSink) -> Result<()> {
        self.requests.lock().push(request.clone());
        match &self.script {
            Script::Fragments(fragments) => {
                for f in fragments {
                    sink.push(*f).await?;
                }
                Ok(())
            }
            Script::FailAfter(fragments, message) => {
                for f in fragments {
                    sink.push(*f).await?;
                }
                Err(Error::StreamingFailure(message.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Emits fragments slowly and counts how many were accepted
#[derive(Default)]
pub struct EndlessGenerator {
    pub delivered: AtomicUsize,
}

#[async_trait]
impl AnswerGenerator for EndlessGenerator {
    async fn generate(&self, _request: &GenerationRequest, sink: &mut FragmentSink) -> Result<()> {
        for i in 0..10_000 {
            sink.push(format!("{} ", i)).await?;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "endless"
    }
}
