//! Approximate neighbor graph backed by `hnsw_rs`
//!
//! Node ids are insertion positions in the owning index. Clones share one
//! graph, so a snapshot may see points appended after it was taken; searches
//! drop ids at or beyond the caller's limit.

use hnsw_rs::prelude::*;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};

/// Upper bound on graph layers accepted by `hnsw_rs`
const MAX_LAYERS: usize = 16;

/// Distance between two unit vectors
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}

/// A scored entry; orders by distance, then by id so ties are stable
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub distance: f32,
    pub id: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Shared HNSW graph over cosine distance
#[derive(Clone)]
pub struct NeighborGraph {
    hnsw: Arc<Hnsw<'static, f32, DistCosine>>,
}

impl fmt::Debug for NeighborGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighborGraph")
            .field("points", &self.len())
            .finish()
    }
}

impl NeighborGraph {
    /// Create an empty graph
    pub fn new(config: &VectorDbConfig) -> Self {
        let hnsw = Hnsw::new(
            config.hnsw_m,
            config.hnsw_max_elements,
            MAX_LAYERS,
            config.hnsw_ef_construction,
            DistCosine {},
        );
        Self {
            hnsw: Arc::new(hnsw),
        }
    }

    /// Build a graph from vectors in insertion order
    pub fn rebuild<V: AsRef<[f32]>>(vectors: &[V], config: &VectorDbConfig) -> Self {
        let graph = Self::new(config);
        for (id, vector) in vectors.iter().enumerate() {
            graph.insert(id, vector.as_ref());
        }
        graph
    }

    /// Number of points in the graph
    pub fn len(&self) -> usize {
        self.hnsw.get_nb_point()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, id: usize, vector: &[f32]) {
        self.hnsw.insert_slice((vector, id));
    }

    /// Up to `ef` approximate neighbor ids below `limit`
    pub fn search(&self, query: &[f32], ef: usize, limit: usize) -> Vec<usize> {
        self.hnsw
            .search(query, ef, ef)
            .into_iter()
            .map(|neighbour| neighbour.d_id)
            .filter(|&id| id < limit)
            .collect()
    }

    /// Write the graph into `dir`; returns the basename actually used
    pub fn dump(&self, dir: &Path, basename: &str) -> Result<String> {
        self.hnsw
            .file_dump(dir, basename)
            .map_err(|e| Error::vector_db(format!("Failed to dump graph: {}", e)))
    }

    /// Reload a graph written by [`NeighborGraph::dump`]
    pub fn load(dir: &Path, basename: &str) -> Result<Self> {
        // A reloaded graph borrows its loader for as long as it lives
        let loader: &'static mut HnswIo = Box::leak(Box::new(HnswIo::new(dir, basename)));
        let hnsw = loader
            .load_hnsw::<f32, DistCosine>()
            .map_err(|e| Error::vector_db(format!("Failed to load graph: {}", e)))?;

        Ok(Self {
            hnsw: Arc::new(hnsw),
        })
    }
}
