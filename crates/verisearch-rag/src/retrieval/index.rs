//! In-memory vector index with on-disk snapshots
//!
//! A snapshot is two parts in one directory: the `hnsw_rs` graph dump and a
//! bincode file with the entries, which is written last and names the dump.
//! The entries carry their vectors, so a missing or stale dump is rebuilt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::hnsw::{distance, Candidate, NeighborGraph};
use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::Segment;

/// Snapshot file name inside the storage directory
pub const SNAPSHOT_FILE: &str = "index.bin";

/// Basename requested for the graph dump
const GRAPH_BASENAME: &str = "index_graph";

const FORMAT_VERSION: u32 = 2;

/// One embedded segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub segment: Segment,
}

impl AsRef<[f32]> for IndexEntry {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}

/// A coarse retrieval result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub segment: Segment,
    /// `1 - cosine`; lower is closer
    pub distance: f32,
    /// Insertion position of the entry
    pub position: usize,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    model_id: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
    graph_basename: Option<String>,
}

/// Append-only collection of embedded segments with approximate kNN search
///
/// Clones share the graph. Only one clone may insert at a time, which
/// `IndexService` guarantees with its writer guard.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model_id: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
    graph: NeighborGraph,
    ef_search: usize,
}

impl VectorIndex {
    /// Create an empty index for vectors from `model_id`
    pub fn new(model_id: impl Into<String>, dimension: usize, config: &VectorDbConfig) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
            entries: Vec::new(),
            graph: NeighborGraph::new(config),
            ef_search: config.hnsw_ef_search,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Append embedded segments; nothing is added if any vector is malformed
    pub fn insert(&mut self, segments: Vec<Segment>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if segments.len() != vectors.len() {
            return Err(Error::vector_db(format!(
                "{} segments but {} vectors",
                segments.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::vector_db(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimension,
                bad.len()
            )));
        }

        let added = segments.len();
        for (segment, vector) in segments.into_iter().zip(vectors) {
            self.graph.insert(self.entries.len(), &vector);
            self.entries.push(IndexEntry { vector, segment });
        }

        Ok(added)
    }

    /// The `k` closest entries, ties going to the earlier insertion
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(Error::vector_db(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let ef = self.ef_search.max(k);
        let ids: Vec<usize> = if self.entries.len() <= ef {
            // Small enough to scan exactly
            (0..self.entries.len()).collect()
        } else {
            self.graph.search(query, ef, self.entries.len())
        };

        // Rescore with the exact distance so both paths order identically
        let mut found: Vec<Candidate> = ids
            .into_iter()
            .map(|id| Candidate {
                distance: distance(&self.entries[id].vector, query),
                id,
            })
            .collect();
        found.sort();
        found.dedup_by_key(|c| c.id);
        found.truncate(k);

        Ok(found
            .into_iter()
            .map(|c| SearchHit {
                segment: self.entries[c.id].segment.clone(),
                distance: c.distance,
                position: c.id,
            })
            .collect())
    }

    /// Snapshot location inside `dir`
    pub fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    /// Write the full index to `dir`; the entries file is replaced atomically
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let graph_basename = self.graph.dump(dir, GRAPH_BASENAME)?;
        let snapshot = Snapshot {
            format_version: FORMAT_VERSION,
            model_id: self.model_id.clone(),
            dimension: self.dimension,
            entries: self.entries.clone(),
            graph_basename: Some(graph_basename),
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| Error::vector_db(format!("Failed to encode index: {}", e)))?;

        let path = Self::snapshot_path(dir);
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), entries = self.entries.len(), "Saved index");
        Ok(())
    }

    /// Restore an index from `dir`
    ///
    /// `Ok(None)` when no snapshot exists, or when the snapshot could not be
    /// decoded; an undecodable file is renamed aside rather than overwritten.
    pub fn load(dir: &Path, model_id: &str, config: &VectorDbConfig) -> Result<Option<Self>> {
        let path = Self::snapshot_path(dir);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot = match bincode::serde::decode_from_slice::<Snapshot, _>(
            &bytes,
            bincode::config::standard(),
        ) {
            Ok((snapshot, _)) if snapshot.format_version == FORMAT_VERSION => snapshot,
            Ok((snapshot, _)) => {
                let reason = format!("unsupported snapshot version {}", snapshot.format_version);
                return Self::quarantine(&path, &reason).map(|_| None);
            }
            Err(e) => {
                return Self::quarantine(&path, &e.to_string()).map(|_| None);
            }
        };

        if snapshot.model_id != model_id {
            return Err(Error::vector_db(format!(
                "Index was built with '{}' but the embedder is '{}'; rebuild the index",
                snapshot.model_id, model_id
            )));
        }

        let graph = Self::restore_graph(dir, &snapshot, config);
        tracing::info!(path = %path.display(), entries = snapshot.entries.len(), "Loaded index");

        Ok(Some(Self {
            model_id: snapshot.model_id,
            dimension: snapshot.dimension,
            entries: snapshot.entries,
            graph,
            ef_search: config.hnsw_ef_search,
        }))
    }

    fn restore_graph(dir: &Path, snapshot: &Snapshot, config: &VectorDbConfig) -> NeighborGraph {
        let expected = snapshot.entries.len();
        if let Some(basename) = snapshot.graph_basename.as_deref() {
            match NeighborGraph::load(dir, basename) {
                Ok(graph) if graph.len() == expected => return graph,
                Ok(graph) => tracing::warn!(
                    graph = graph.len(),
                    entries = expected,
                    "Graph dump does not match entries, rebuilding"
                ),
                Err(e) => tracing::warn!("Graph dump unusable, rebuilding: {}", e),
            }
        }

        NeighborGraph::rebuild(&snapshot.entries, config)
    }

    /// Move an undecodable snapshot out of the way
    fn quarantine(path: &Path, reason: &str) -> Result<PathBuf> {
        let aside = path.with_extension(format!("bin.corrupt-{}", Uuid::new_v4().simple()));
        std::fs::rename(path, &aside)?;
        tracing::error!(
            path = %path.display(),
            moved_to = %aside.display(),
            reason,
            "Index snapshot unreadable; moved aside, starting with an empty index"
        );
        Ok(aside)
    }
}
