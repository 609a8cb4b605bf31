use std::path::PathBuf;

use proposal_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding provider returned {actual} vectors for {expected} documents")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("scoring config error: {0}")]
    ScoringConfig(String),
}
