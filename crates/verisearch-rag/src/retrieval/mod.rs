//! Coarse retrieval: HNSW vector index and the shared index service

mod hnsw;
mod index;
mod service;

pub use hnsw::{distance, Candidate, NeighborGraph};
pub use index::{IndexEntry, SearchHit, VectorIndex, SNAPSHOT_FILE};
pub use service::IndexService;
