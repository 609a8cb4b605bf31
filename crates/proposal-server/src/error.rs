use proposal_common::error::CommonError;
use proposal_common::llm::CompletionError;
use proposal_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("config error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Join(String),
}
