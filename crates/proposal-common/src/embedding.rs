/// Embedding provider abstraction and its fastembed-backed implementation.
///
/// `TextEmbedding` from fastembed is synchronous and CPU-bound. The retrieval core is
/// synchronous as well, so the `EmbeddingProvider` methods are blocking calls; async callers
/// dispatch whole retrieval operations through `tokio::task::spawn_blocking` instead of
/// wrapping each embed call.
use std::sync::Arc;

use tracing::info;

use crate::error::CommonError;

/// Turns text into fixed-dimension dense vectors.
///
/// Implementations must be deterministic for identical input: the retrieval index
/// assumes a document embedded at build time and the same text embedded as a query
/// land on comparable vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of documents for indexing, one vector per input in the same order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError>;

    /// Embed a single search query.
    ///
    /// Defaults to embedding the text as a document; models trained with asymmetric
    /// task prefixes override this.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, CommonError> {
        single(self.embed(&[text.to_string()])?)
    }
}

fn single(mut vectors: Vec<Vec<f32>>) -> Result<Vec<f32>, CommonError> {
    vectors
        .pop()
        .ok_or_else(|| CommonError::Embedding("empty embedding result".to_string()))
}

/// Embedding models accepted by `EMBEDDING_MODEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingModelName {
    AllMiniLmL6V2,
    BgeSmallEnV15,
    NomicEmbedTextV15,
}

impl EmbeddingModelName {
    /// Parse the model names used in configuration files ("all-MiniLM-L6-v2", ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                Some(Self::AllMiniLmL6V2)
            }
            "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Some(Self::BgeSmallEnV15),
            "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
                Some(Self::NomicEmbedTextV15)
            }
            _ => None,
        }
    }

    /// `(document, query)` input prefixes the model was trained with.
    ///
    /// nomic-embed-text expects "search_document: {text}" at index time and
    /// "search_query: {text}" at query time.
    fn task_prefixes(self) -> (&'static str, &'static str) {
        match self {
            Self::NomicEmbedTextV15 => ("search_document: ", "search_query: "),
            Self::AllMiniLmL6V2 | Self::BgeSmallEnV15 => ("", ""),
        }
    }

    fn to_fastembed(self) -> fastembed::EmbeddingModel {
        match self {
            Self::AllMiniLmL6V2 => fastembed::EmbeddingModel::AllMiniLML6V2,
            Self::BgeSmallEnV15 => fastembed::EmbeddingModel::BGESmallENV15,
            Self::NomicEmbedTextV15 => fastembed::EmbeddingModel::NomicEmbedTextV15,
        }
    }
}

/// Wraps fastembed's `TextEmbedding` model.
pub struct Embedder {
    model: Arc<fastembed::TextEmbedding>,
    name: EmbeddingModelName,
}

impl Embedder {
    /// Initialize the embedding model.
    ///
    /// This downloads the model on first run. The download happens synchronously
    /// inside a blocking task.
    pub async fn new(name: EmbeddingModelName) -> Result<Self, CommonError> {
        let model = tokio::task::spawn_blocking(move || {
            let options = fastembed::InitOptions::new(name.to_fastembed())
                .with_show_download_progress(true);
            fastembed::TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| CommonError::Embedding(format!("spawn_blocking join error: {e}")))?
        .map_err(|e| CommonError::Embedding(format!("model initialization failed: {e}")))?;

        info!(model = ?name, "embedding model loaded");
        Ok(Self {
            model: Arc::new(model),
            name,
        })
    }

    /// Texts are processed in small batches to bound peak memory during ONNX inference.
    fn run(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, CommonError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(inputs, Some(8))
            .map_err(|e| CommonError::Embedding(format!("embedding failed: {e}")))
    }
}

impl EmbeddingProvider for Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        let (prefix, _) = self.name.task_prefixes();
        self.run(texts.iter().map(|t| format!("{prefix}{t}")).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, CommonError> {
        let (_, prefix) = self.name.task_prefixes();
        single(self.run(vec![format!("{prefix}{text}")])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_model_names() {
        assert_eq!(
            EmbeddingModelName::parse("all-MiniLM-L6-v2"),
            Some(EmbeddingModelName::AllMiniLmL6V2)
        );
        assert_eq!(
            EmbeddingModelName::parse(" BAAI/bge-small-en-v1.5 "),
            Some(EmbeddingModelName::BgeSmallEnV15)
        );
        assert_eq!(
            EmbeddingModelName::parse("nomic-embed-text-v1.5"),
            Some(EmbeddingModelName::NomicEmbedTextV15)
        );
        assert_eq!(EmbeddingModelName::parse("word2vec"), None);
    }

    struct Fixed;

    impl EmbeddingProvider for Fixed {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn embed_query_defaults_to_document_embedding() {
        let v = Fixed.embed_query("abcd").unwrap();
        assert_eq!(v, vec![4.0]);
    }

    #[test]
    fn only_nomic_uses_task_prefixes() {
        assert_eq!(
            EmbeddingModelName::NomicEmbedTextV15.task_prefixes(),
            ("search_document: ", "search_query: ")
        );
        assert_eq!(EmbeddingModelName::AllMiniLmL6V2.task_prefixes(), ("", ""));
        assert_eq!(EmbeddingModelName::BgeSmallEnV15.task_prefixes(), ("", ""));
    }
}
