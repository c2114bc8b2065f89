//! Shared index handle used by both ingestion and query paths
//!
//! Readers take a cheap `Arc` snapshot and never wait on writers. Writers
//! serialize on an async mutex, build the next index off to the side, publish
//! it, and persist it before releasing the guard.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::index::{SearchHit, VectorIndex};
use crate::config::VectorDbConfig;
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::types::Segment;

/// Process-wide vector index service
pub struct IndexService {
    embedder: Arc<dyn Embedder>,
    current: RwLock<Arc<VectorIndex>>,
    writer: Mutex<()>,
    storage_dir: PathBuf,
    embed_timeout: Duration,
}

impl IndexService {
    /// Restore the index from `config.storage_dir`, or start empty
    pub fn open(
        embedder: Arc<dyn Embedder>,
        config: &VectorDbConfig,
        embed_timeout: Duration,
    ) -> Result<Self> {
        let index = match VectorIndex::load(&config.storage_dir, embedder.model_id(), config)? {
            Some(index) => index,
            None => {
                tracing::info!(
                    path = %config.storage_dir.display(),
                    "No saved index found, starting empty"
                );
                VectorIndex::new(embedder.model_id(), embedder.dimensions(), config)
            }
        };

        Ok(Self {
            embedder,
            current: RwLock::new(Arc::new(index)),
            writer: Mutex::new(()),
            storage_dir: config.storage_dir.clone(),
            embed_timeout,
        })
    }

    /// The latest published index
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.current.read().clone()
    }

    /// Number of indexed segments
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Embed and append segments, then persist
    ///
    /// Persistence runs even when embedding fails so disk never lags memory.
    pub async fn insert(&self, segments: Vec<Segment>) -> Result<usize> {
        let _guard = self.writer.lock().await;

        let outcome = self.embed_and_publish(segments).await;
        let persisted = self.persist_locked().await;

        let added = outcome?;
        persisted?;
        Ok(added)
    }

    async fn embed_and_publish(&self, segments: Vec<Segment>) -> Result<usize> {
        if segments.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text().to_string()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let mut next = (*self.snapshot()).clone();
        let added = next.insert(segments, vectors)?;
        *self.current.write() = Arc::new(next);

        tracing::debug!(added, total = self.len(), "Published index");
        Ok(added)
    }

    /// Flush the current index to disk under the writer guard
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.persist_locked().await
    }

    async fn persist_locked(&self) -> Result<()> {
        let index = self.snapshot();
        if index.is_empty() {
            return Ok(());
        }

        let dir = self.storage_dir.clone();
        tokio::task::spawn_blocking(move || index.save(&dir))
            .await
            .map_err(|e| Error::internal(format!("Index save task failed: {}", e)))?
    }

    /// The `k` closest segments to `text`
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.snapshot();
        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let vector = tokio::time::timeout(self.embed_timeout, self.embedder.embed(text))
            .await
            .map_err(|_| Error::embedding("Query embedding timed out"))??;

        index.search(&vector, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::types::{DocumentKind, Locator, SourceMetadata};
    use uuid::Uuid;

    fn config(dir: &Path) -> VectorDbConfig {
        VectorDbConfig {
            storage_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn segments(texts: &[&str]) -> Vec<Segment> {
        let doc_id = Uuid::new_v4();
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Segment::new(
                    *t,
                    SourceMetadata::new("notes.txt", DocumentKind::Text, Locator::Whole),
                    doc_id,
                )
                .derive(format!("{} #{}", t, i))
            })
            .collect()
    }

    fn open(dir: &Path) -> IndexService {
        IndexService::open(
            Arc::new(HashEmbedder::new(64)),
            &config(dir),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_on_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(dir.path());
        assert!(matches!(service.query("hi", 3).await, Err(Error::EmptyIndex)));
    }

    #[tokio::test]
    async fn test_insert_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(dir.path());

        let added = service
            .insert(segments(&["solar panels", "wind turbines", "hydro dams"]))
            .await
            .unwrap();
        assert_eq!(added, 3);
        assert!(VectorIndex::snapshot_path(dir.path()).exists());

        let before = service.query("wind power", 2).await.unwrap();
        let reopened = open(dir.path());
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.query("wind power", 2).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_index_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(dir.path());
        service.persist().await.unwrap();
        assert!(!VectorIndex::snapshot_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_reader_snapshot_is_stable_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(dir.path());
        service.insert(segments(&["first"])).await.unwrap();

        let held = service.snapshot();
        service.insert(segments(&["second", "third"])).await.unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(service.len(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(VectorIndex::snapshot_path(dir.path()), b"\x00\xffgarbage").unwrap();

        let service = open(dir.path());
        assert!(service.is_empty());
        assert!(!VectorIndex::snapshot_path(dir.path()).exists());

        service.insert(segments(&["fresh start"])).await.unwrap();
        assert_eq!(open(dir.path()).len(), 1);
    }
}
