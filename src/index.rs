//! Exact nearest-neighbor index over article embeddings.
//!
//! Brute-force cosine search on L2-normalized vectors, where cosine
//! similarity is a plain dot product. For the dataset sizes this engine
//! handles (hundreds of articles per partition) brute force is both fast
//! enough and, unlike approximate structures, exactly reproducible —
//! identical inputs always yield identical clustering decisions.

use std::collections::BTreeMap;

use crate::types::{ArticleId, Score, VectorDimension, VectorError};

/// Nearest-neighbor index over all embeddings seen so far in a partition.
///
/// Keyed by `ArticleId` in a `BTreeMap`, so iteration order is ascending
/// id; combined with a strict `>` comparison in [`nearest`], ties in
/// similarity resolve to the lowest article id without a separate pass.
///
/// [`nearest`]: SimilarityIndex::nearest
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityIndex {
    vectors: BTreeMap<ArticleId, Vec<f32>>,
    dimension: VectorDimension,
}

impl SimilarityIndex {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            vectors: BTreeMap::new(),
            dimension,
        }
    }

    /// Inserts an embedding, overwriting any existing entry for the id.
    ///
    /// Overwrite-not-duplicate keeps reprocessing after a crash-restart
    /// idempotent.
    pub fn insert(&mut self, id: ArticleId, vector: Vec<f32>) -> Result<(), VectorError> {
        self.dimension.validate_vector(&vector)?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Returns the `k` most similar indexed articles, best first.
    ///
    /// An empty index yields an empty list — the expected state for the
    /// first article of a run, not an error.
    pub fn nearest(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(ArticleId, Score)>, VectorError> {
        self.dimension.validate_vector(query)?;

        let mut candidates: Vec<(ArticleId, Score)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (*id, Score::from_similarity(dot(query, vector))))
            .collect();

        // Stable sort over ascending-id input: equal scores keep the
        // lowest id first.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(k);
        Ok(candidates)
    }

    #[must_use]
    pub fn contains(&self, id: ArticleId) -> bool {
        self.vectors.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: ArticleId) -> Option<&[f32]> {
        self.vectors.get(&id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Iterates entries in ascending id order (persistence path).
    pub fn entries(&self) -> impl Iterator<Item = (ArticleId, &[f32])> {
        self.vectors.iter().map(|(id, v)| (*id, v.as_slice()))
    }
}

/// Dot product; equals cosine similarity on normalized vectors.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
