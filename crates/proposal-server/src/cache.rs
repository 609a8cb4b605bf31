/// Redis caching layer for retrieval results.
///
/// All operations degrade to a miss when Redis is unavailable; callers fall through to
/// searching the in-memory index.
///
/// Key schema (inside the `rfp:v1:{embedding model}:{merge}` namespace):
/// - `search:{sha256(fingerprint|mode|query|k)}`: JSON `Vec<SearchHit>` (TTL: 3600s)
///
/// The fingerprint is a content hash of the loaded corpus, so a restarted process or a
/// second server sharing the same Redis only ever hits results computed over identical
/// files. The namespace separates servers whose vectors or ranking differ.
use sha2::{Digest, Sha256};
use tracing::debug;

use proposal_common::embedding::EmbeddingModelName;
use proposal_common::redis::RedisCache;
use proposal_core::model::SearchHit;
use proposal_core::search::MergeStrategyKind;

const NAMESPACE: &str = "rfp:v1";
const SEARCH_TTL_SECS: u64 = 3600;

/// Which retrieval operation produced a cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    MultiHop,
}

impl SearchMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::MultiHop => "multi_hop",
        }
    }
}

/// Namespace for one retrieval configuration.
pub fn namespace(model: EmbeddingModelName, merge: MergeStrategyKind) -> String {
    format!("{NAMESPACE}:{model:?}:{merge:?}").to_lowercase()
}

pub struct SearchCache {
    redis: RedisCache,
}

impl SearchCache {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    pub fn disabled() -> Self {
        Self::new(RedisCache::disabled(NAMESPACE))
    }

    pub async fn get(&self, fingerprint: &str, mode: SearchMode, query: &str, k: usize) -> Option<Vec<SearchHit>> {
        let key = search_key(fingerprint, mode, query, k);
        let hits = self.redis.get_json(&key).await;
        if hits.is_some() {
            debug!(mode = mode.as_str(), k, "search cache hit");
        }
        hits
    }

    pub async fn set(&self, fingerprint: &str, mode: SearchMode, query: &str, k: usize, hits: &[SearchHit]) {
        let key = search_key(fingerprint, mode, query, k);
        self.redis.set_json(&key, &hits, SEARCH_TTL_SECS).await;
    }

    /// Drop every cached result in this namespace. Used after a knowledge-base reload.
    pub async fn invalidate_all(&self) {
        self.redis.clear().await;
    }
}

/// Deterministic cache key for one search request.
fn search_key(fingerprint: &str, mode: SearchMode, query: &str, k: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hasher.update(b"|");
    hasher.update(mode.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(query.as_bytes());
    hasher.update(b"|");
    hasher.update(k.to_string().as_bytes());
    format!("search:{:x}", hasher.finalize())
}
