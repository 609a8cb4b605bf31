/// Hybrid (dense + sparse) retrieval and two-pass multi-hop search.
///
/// Dense hits carry an L2 distance (lower is closer) and sparse hits a cosine similarity
/// (higher is closer). How the two lists are combined is delegated to a `MergeStrategy`;
/// the default `RawScoreMerge` sorts both on their raw values as if comparable, which
/// keeps the historical ranking. `SimilarityMerge` maps distances onto a similarity scale
/// first.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proposal_common::embedding::EmbeddingProvider;
use tracing::debug;

use crate::error::CoreError;
use crate::index::EmbeddingIndex;
use crate::model::{KnowledgeDocument, SearchHit};
use crate::sanitize::sanitize;

/// Number of first-pass results whose content seeds the second pass.
const SEED_RESULTS: usize = 3;
/// Characters taken from each seed result's content.
const SEED_CHARS: usize = 200;

/// Combines ranked dense `(distance, id)` and sparse `(similarity, id)` lists into at
/// most `k` `(score, id)` pairs with unique ids, best first.
pub trait MergeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn merge(&self, dense: Vec<(f32, usize)>, sparse: Vec<(f32, usize)>, k: usize) -> Vec<(f32, usize)>;
}

/// Dense results first, then unseen sparse results, sorted by raw score descending.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawScoreMerge;

impl MergeStrategy for RawScoreMerge {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn merge(&self, dense: Vec<(f32, usize)>, sparse: Vec<(f32, usize)>, k: usize) -> Vec<(f32, usize)> {
        rank_unique(dense, sparse, k)
    }
}

/// Like `RawScoreMerge`, but dense distances become `1 / (1 + d)` before sorting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityMerge;

impl MergeStrategy for SimilarityMerge {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn merge(&self, dense: Vec<(f32, usize)>, sparse: Vec<(f32, usize)>, k: usize) -> Vec<(f32, usize)> {
        let dense = dense
            .into_iter()
            .map(|(distance, id)| (1.0 / (1.0 + distance.max(0.0)), id))
            .collect();
        rank_unique(dense, sparse, k)
    }
}

/// Concatenate, drop ids already seen (earlier list wins), stable-sort descending, take `k`.
fn rank_unique(first: Vec<(f32, usize)>, second: Vec<(f32, usize)>, k: usize) -> Vec<(f32, usize)> {
    let mut seen = HashSet::new();
    let mut merged: Vec<(f32, usize)> = first
        .into_iter()
        .chain(second)
        .filter(|(_, id)| seen.insert(*id))
        .collect();
    merged.sort_by(|a, b| b.0.total_cmp(&a.0));
    merged.truncate(k);
    merged
}

/// Merge strategies selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategyKind {
    #[default]
    Raw,
    Similarity,
}

impl MergeStrategyKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "similarity" => Some(Self::Similarity),
            _ => None,
        }
    }

    pub fn build(self) -> Arc<dyn MergeStrategy> {
        match self {
            Self::Raw => Arc::new(RawScoreMerge),
            Self::Similarity => Arc::new(SimilarityMerge),
        }
    }
}

/// Borrowed view over one document snapshot and the providers needed to query it.
pub struct Retriever<'a> {
    pub documents: &'a [KnowledgeDocument],
    pub index: &'a EmbeddingIndex,
    pub embedder: &'a dyn EmbeddingProvider,
    pub merge: &'a dyn MergeStrategy,
}

impl Retriever<'_> {
    /// At most `k` documents ranked by the merge strategy, without duplicates.
    ///
    /// An empty index or `k == 0` yields no results and never calls the embedder.
    pub fn hybrid_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, CoreError> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query = sanitize(query);

        let query_vector = self.embedder.embed_query(&query)?;
        let dense = self.index.search_dense(&query_vector, k)?;
        let sparse = self.index.search_sparse(&query, k);
        debug!(
            dense = dense.len(),
            sparse = sparse.len(),
            strategy = self.merge.name(),
            "hybrid candidates"
        );

        let merged = self.merge.merge(dense, sparse, k);
        Ok(merged
            .into_iter()
            .filter_map(|(score, id)| {
                self.documents.get(id).map(|document| SearchHit {
                    score,
                    document: document.clone(),
                })
            })
            .collect())
    }

    /// Two-pass retrieval: the top first-pass hits extend the query for a second pass.
    ///
    /// The first pass fetches `3k` candidates. The refined query is the original followed
    /// by the first 200 characters of each of the top three candidates. Both passes are
    /// unioned by document id with second-pass hits replacing first-pass ones, then the
    /// best `k` are returned.
    pub fn multi_hop_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, CoreError> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query = sanitize(query);

        let first_pass = self.hybrid_search(&query, k.saturating_mul(3))?;
        let refined = refine_query(&query, &first_pass);
        let second_pass = self.hybrid_search(&refined, k)?;
        debug!(
            first = first_pass.len(),
            second = second_pass.len(),
            refined_len = refined.len(),
            "multi-hop passes"
        );

        Ok(union_later_wins(first_pass, second_pass, k))
    }
}

/// Union of two passes keyed by document id; a second-pass hit replaces the first-pass
/// hit for the same id. Ties keep first-seen order.
fn union_later_wins(first: Vec<SearchHit>, second: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    let mut position: HashMap<usize, usize> = HashMap::new();
    let mut union: Vec<SearchHit> = Vec::new();
    for hit in first.into_iter().chain(second) {
        match position.get(&hit.document.id) {
            Some(&at) => union[at] = hit,
            None => {
                position.insert(hit.document.id, union.len());
                union.push(hit);
            }
        }
    }

    union.sort_by(|a, b| b.score.total_cmp(&a.score));
    union.truncate(k);
    union
}

fn refine_query(query: &str, seeds: &[SearchHit]) -> String {
    let mut parts = vec![query.to_string()];
    parts.extend(
        seeds
            .iter()
            .take(SEED_RESULTS)
            .map(|hit| hit.document.content.chars().take(SEED_CHARS).collect::<String>()),
    );
    parts.join(" ")
}
