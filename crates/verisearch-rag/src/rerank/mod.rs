//! Second-stage relevance scoring over the coarse candidate set

mod cross_encoder;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Segment;

pub use cross_encoder::CrossEncoderReranker;

/// A candidate position with its relevance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedIndex {
    /// Position in the candidate slice passed to `rerank`
    pub index: usize,
    /// Higher is more relevant
    pub score: f32,
}

/// Reorders candidates by joint query/passage relevance
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Candidate positions, most relevant first; never longer than `candidates`
    async fn rerank(&self, query: &str, candidates: &[Segment]) -> Result<Vec<RankedIndex>>;

    /// Model name for logs and the status probe
    fn name(&self) -> &str;
}

/// Sort scores descending, earlier candidates first on ties
pub fn rank_scores(scores: &[f32]) -> Vec<RankedIndex> {
    let mut ranked: Vec<RankedIndex> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| RankedIndex { index, score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_scores_descending_with_stable_ties() {
        let ranked = rank_scores(&[0.1, 0.9, 0.5, 0.9]);
        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }
}
