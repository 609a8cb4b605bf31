/// Deterministic fixtures for tests that need an embedding provider without a model.
use proposal_common::embedding::EmbeddingProvider;
use proposal_common::error::CommonError;

use crate::model::{DocumentMetadata, KnowledgeDocument};
use crate::tfidf::tokenize;

/// Hashed bag-of-words embedder: each token adds 1.0 to bucket `hash(token) % dim`.
pub struct HashingEmbedder {
    pub dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: 64 }
    }
}

impl HashingEmbedder {
    fn bucket(&self, token: &str) -> usize {
        // FNV-1a, stable across runs unlike the std hasher.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in token.bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimension as u64) as usize
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; self.dimension];
                for token in tokenize(text) {
                    v[self.bucket(&token)] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Embedder that always fails, for error-propagation tests.
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        Err(CommonError::Embedding("provider offline".to_string()))
    }
}

pub fn doc(id: usize, section: &str, content: &str) -> KnowledgeDocument {
    KnowledgeDocument {
        id,
        filename: format!("doc{id}.md"),
        section_name: section.to_string(),
        content: content.to_string(),
        metadata: DocumentMetadata::default(),
    }
}
