mod cache;
mod config;
mod error;
mod flows;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::SearchCache;
use config::Config;
use proposal_common::embedding::Embedder;
use proposal_common::llm::OpenAiClient;
use proposal_common::redis::RedisCache;
use proposal_core::store::KnowledgeBase;
use server::ProposalServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting proposal MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        knowledge_base_dir = %config.knowledge_base_dir.display(),
        embedding_model = ?config.embedding_model,
        merge = ?config.merge_strategy,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    // 2. Connect to Redis (optional)
    let namespace = cache::namespace(config.embedding_model, config.merge_strategy);
    let redis_cache = RedisCache::new(config.redis_url.as_deref(), &namespace);
    if !redis_cache.is_enabled() {
        info!("redis not configured, running without cache");
    } else if redis_cache.is_available().await {
        info!(namespace = %namespace, "redis connected");
    } else {
        warn!("redis unavailable, running without cache");
    }
    let cache = Arc::new(SearchCache::new(redis_cache));

    // 3. Initialize embedding model
    info!("initializing embedding model (may download on first run)");
    let embedder = Arc::new(Embedder::new(config.embedding_model).await?);
    info!("embedding model ready");

    // 4. Load the knowledge base. A failed load leaves it empty; the
    //    load_knowledge_base tool can retry.
    let knowledge_base = Arc::new(KnowledgeBase::new(embedder, config.merge_strategy.build()));
    let kb = Arc::clone(&knowledge_base);
    let dir = config.knowledge_base_dir.clone();
    match tokio::task::spawn_blocking(move || kb.load(&dir)).await? {
        Ok(summary) => info!(
            generation = summary.generation,
            documents = summary.documents,
            sections = summary.sections,
            "knowledge base ready"
        ),
        Err(e) => warn!(error = %e, "initial knowledge base load failed, starting empty"),
    }

    // 5. Completion client
    let llm = Arc::new(OpenAiClient::new(config.completion.clone())?);
    info!(
        model = %llm.config().model,
        base_url = %llm.config().base_url,
        api_key = llm.config().api_key.is_some(),
        "completion client ready"
    );

    // 6. Build MCP server and serve on stdio
    let server = ProposalServer::new(knowledge_base, llm, cache, config);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
