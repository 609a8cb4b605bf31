use std::path::PathBuf;

use proposal_common::embedding::EmbeddingModelName;
use proposal_common::llm::OpenAiClientConfig;
use proposal_core::scoring::ScoringConfiguration;
use proposal_core::search::MergeStrategyKind;

use crate::error::AppError;

const DEFAULT_KNOWLEDGE_BASE_DIR: &str = "markdown_responses";
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Application configuration loaded explicitly from environment variables.
///
/// Every setting has a default, so an empty environment starts a working server without
/// caching. Values that are present but invalid are rejected at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of past proposals. Created empty if it does not exist.
    pub knowledge_base_dir: PathBuf,
    pub embedding_model: EmbeddingModelName,
    /// Metric weights and grade bands used when a request does not supply its own.
    pub scoring: ScoringConfiguration,
    pub merge_strategy: MergeStrategyKind,
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables caching.
    pub redis_url: Option<String>,
    pub completion: OpenAiClientConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `KNOWLEDGE_BASE_DIR`: knowledge base directory (default `markdown_responses`)
    /// - `EMBEDDING_MODEL`: `all-MiniLM-L6-v2`, `bge-small-en-v1.5` or `nomic-embed-text-v1.5`
    /// - `SCORING_CONFIG_PATH`: JSON scoring configuration (default: built-in weights)
    /// - `RETRIEVAL_MERGE`: `raw` (default) or `similarity`
    /// - `REDIS_URL`: Redis connection string (omit to disable caching)
    /// - `OPENAI_*`: completion endpoint, see `OpenAiClientConfig::from_env`
    pub fn from_env() -> Result<Self, AppError> {
        let knowledge_base_dir = PathBuf::from(
            env_non_empty("KNOWLEDGE_BASE_DIR")
                .unwrap_or_else(|| DEFAULT_KNOWLEDGE_BASE_DIR.to_string()),
        );

        let model_name = env_non_empty("EMBEDDING_MODEL")
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        let embedding_model = EmbeddingModelName::parse(&model_name).ok_or_else(|| {
            AppError::Config(format!("unsupported EMBEDDING_MODEL '{model_name}'"))
        })?;

        let scoring = match env_non_empty("SCORING_CONFIG_PATH") {
            Some(path) => ScoringConfiguration::from_json_file(&PathBuf::from(path))?,
            None => ScoringConfiguration::default(),
        };

        let merge_strategy = match env_non_empty("RETRIEVAL_MERGE") {
            Some(name) => MergeStrategyKind::parse(&name).ok_or_else(|| {
                AppError::Config(format!(
                    "RETRIEVAL_MERGE must be 'raw' or 'similarity', got '{name}'"
                ))
            })?,
            None => MergeStrategyKind::default(),
        };

        Ok(Self {
            knowledge_base_dir,
            embedding_model,
            scoring,
            merge_strategy,
            redis_url: env_non_empty("REDIS_URL"),
            completion: OpenAiClientConfig::from_env(),
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
