/// Dense and sparse indexes over the knowledge-base documents.
///
/// Both are keyed by document id (row position) and rebuilt wholesale with the document
/// store; there is no incremental insert. The dense side is an exact flat index queried
/// by squared L2 distance. The sparse side is a TF-IDF model fitted over the same
/// sanitized contents, queried by cosine similarity against every document.
use proposal_common::embedding::EmbeddingProvider;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::KnowledgeDocument;
use crate::tfidf::{cosine_similarity, SparseVector, TfidfModel};

/// Exact nearest-neighbour index over fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self, CoreError> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(CoreError::Dimension {
                expected: dimension,
                actual: vectors[bad].len(),
            });
        }
        Ok(Self { dimension, vectors })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` rows closest to `query` as `(squared L2 distance, row)`, nearest first.
    /// Equal distances keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, CoreError> {
        if query.len() != self.dimension {
            return Err(CoreError::Dimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, v)| (squared_l2(query, v), row))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// TF-IDF model plus one vector per document.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    model: TfidfModel,
    vectors: Vec<SparseVector>,
}

impl SparseIndex {
    /// `None` when the corpus has no tokens at all.
    pub fn build<S: AsRef<str>>(contents: &[S]) -> Option<Self> {
        let (model, vectors) = TfidfModel::fit_transform(contents)?;
        Some(Self { model, vectors })
    }

    /// The `k` rows most similar to `query` as `(cosine similarity, row)`, best first.
    ///
    /// Every row is ranked, including rows with zero similarity; equal similarities keep
    /// row order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(f32, usize)> {
        let q = self.model.transform(query);
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, v)| (cosine_similarity(&q, v) as f32, row))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        scored
    }

    pub fn vocabulary_size(&self) -> usize {
        self.model.vocabulary_size()
    }
}

/// Parallel dense and sparse representations of one document snapshot.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    dense: Option<DenseIndex>,
    sparse: Option<SparseIndex>,
}

impl EmbeddingIndex {
    /// Embed every document and fit the sparse model.
    ///
    /// An empty corpus produces an index with neither structure and never calls the
    /// embedding provider. Provider failures propagate.
    pub fn build(
        documents: &[KnowledgeDocument],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self, CoreError> {
        if documents.is_empty() {
            return Ok(Self::default());
        }

        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder.embed(&contents)?;
        if embeddings.len() != documents.len() {
            return Err(CoreError::EmbeddingCount {
                expected: documents.len(),
                actual: embeddings.len(),
            });
        }
        let dense = DenseIndex::new(embeddings)?;

        let sparse = SparseIndex::build(&contents);
        if sparse.is_none() {
            warn!("knowledge base has no indexable terms, lexical search disabled");
        }

        info!(
            documents = documents.len(),
            dimension = dense.dimension(),
            vocabulary = sparse.as_ref().map(SparseIndex::vocabulary_size).unwrap_or(0),
            "embedding index built"
        );

        Ok(Self {
            dense: Some(dense),
            sparse,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.dense.as_ref().map_or(true, DenseIndex::is_empty)
    }

    /// Dense nearest neighbours of an already-embedded query. Empty when unbuilt.
    pub fn search_dense(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, CoreError> {
        match &self.dense {
            Some(dense) => dense.search(query, k),
            None => Ok(Vec::new()),
        }
    }

    /// Lexical matches for a query. Empty when unbuilt or the corpus had no terms.
    pub fn search_sparse(&self, query: &str, k: usize) -> Vec<(f32, usize)> {
        self.sparse
            .as_ref()
            .map(|s| s.search(query, k))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{doc, HashingEmbedder};

    #[test]
    fn dense_search_orders_by_squared_distance() {
        let index = DenseIndex::new(vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]]).unwrap();
        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits, vec![(0.0, 0), (1.0, 2)]);
        let all = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], (25.0, 1));
    }

    #[test]
    fn dense_rejects_mismatched_dimensions() {
        assert!(DenseIndex::new(vec![vec![0.0, 1.0], vec![1.0]]).is_err());
        let index = DenseIndex::new(vec![vec![0.0, 1.0]]).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn sparse_search_ranks_every_document() {
        let index = SparseIndex::build(&["cloud hosting", "catering menu", "cloud backup"]).unwrap();
        let hits = index.search("cloud", 3);
        assert_eq!(hits.len(), 3);
        assert!(hits[0].0 > 0.0 && hits[1].0 > 0.0);
        assert_eq!(hits[2], (0.0, 1));
    }

    #[test]
    fn empty_corpus_builds_empty_index() {
        let index = EmbeddingIndex::build(&[], &HashingEmbedder::default()).unwrap();
        assert!(index.is_empty());
        assert!(index.search_dense(&[1.0, 2.0], 3).unwrap().is_empty());
        assert!(index.search_sparse("anything", 3).is_empty());
    }

    #[test]
    fn build_indexes_both_spaces() {
        let docs = vec![doc(0, "Pricing", "licence fees and support"), doc(1, "Team", "project manager")];
        let embedder = HashingEmbedder::default();
        let index = EmbeddingIndex::build(&docs, &embedder).unwrap();
        assert!(!index.is_empty());

        let q = embedder.embed_query("project manager").unwrap();
        let dense = index.search_dense(&q, 1).unwrap();
        assert_eq!(dense[0].1, 1);
        let sparse = index.search_sparse("licence", 1);
        assert_eq!(sparse[0].1, 0);
    }
}
