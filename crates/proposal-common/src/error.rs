/// Error types shared across the proposal assistant crates.
///
/// Redis failures never surface here: the cache logs them and reports a miss.
/// Completion failures have their own `CompletionError`. Domain crates define their own
/// errors and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("embedding error: {0}")]
    Embedding(String),
}
