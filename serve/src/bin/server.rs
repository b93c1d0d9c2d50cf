//! Binary entry point: loads configuration, wires every adapter and pipeline
//! stage together, and runs the HTTP server until shutdown.

use std::path::Path;
use std::sync::Arc;

use ragcore::{
    AppConfig, CitationMatcher, EsTextIndex, FusionWeights, GraphRetriever, LlmIntentRouter,
    LogRotation, Neo4jGraphEngine, OpenAiEmbedder, OpenAiLlm, Orchestrator, RedisCacheStore,
    RetryPolicy, SessionStore, SqliteRowStore, TextRetriever,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Builds the stdout layer plus, when `LOG_FILE_PATH` is set, a rolling
/// file-log layer alongside it. The returned guard must stay alive for the
/// process lifetime — dropping it stops the background flush writer.
fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    let (file_layer, guard) = match &config.log_file_path {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("regrag.log");
            let rotation = match config.log_rotation {
                LogRotation::Hourly => Rotation::HOURLY,
                LogRotation::Daily => Rotation::DAILY,
                LogRotation::Never => Rotation::NEVER,
            };
            let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };
    let file_configured = file_layer.is_some();

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();
    if file_configured {
        tracing::debug!(retention_days = config.log_retention, "rolling file log sink configured");
    }
    guard
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config::load_and_apply("regrag", None).ok();
    let config = AppConfig::from_env()?;
    let _log_guard = init_logging(&config);

    let row_store: Arc<dyn ragcore::RowStore> = Arc::new(SqliteRowStore::new(&config.row_store.path)?);
    let cache_store: Arc<dyn ragcore::CacheStore> = Arc::new(RedisCacheStore::new(&config.cache.url)?);
    let text_index: Arc<dyn ragcore::TextIndex> =
        Arc::new(EsTextIndex::new(config.text_index.url.clone(), config.text_index.knowledge_index.clone()));
    let cypher_index: Arc<dyn ragcore::TextIndex> =
        Arc::new(EsTextIndex::new(config.text_index.url.clone(), config.text_index.cypher_index.clone()));
    let conversation_index: Arc<dyn ragcore::TextIndex> =
        Arc::new(EsTextIndex::new(config.text_index.url.clone(), config.text_index.conversation_index.clone()));
    let graph_engine: Arc<dyn ragcore::GraphEngine> = Arc::new(Neo4jGraphEngine::new(
        config.graph_engine.url.clone(),
        config.graph_engine.user.clone(),
        config.graph_engine.password.clone(),
    ));

    let answer_llm: Arc<dyn ragcore::LlmClient> = Arc::new(OpenAiLlm::new(
        &config.llm_answer.api_base,
        &config.llm_answer.api_key,
        config.llm_answer.model.clone(),
        config.llm_answer.temperature,
    ));
    let router_llm: Arc<dyn ragcore::LlmClient> = Arc::new(OpenAiLlm::new(
        &config.llm_router.api_base,
        &config.llm_router.api_key,
        config.llm_router.model.clone(),
        config.llm_router.temperature,
    ));
    let citation_llm: Arc<dyn ragcore::LlmClient> = Arc::new(OpenAiLlm::new(
        &config.llm_citation.api_base,
        &config.llm_citation.api_key,
        config.llm_citation.model.clone(),
        config.llm_citation.temperature,
    ));
    let embedder: Arc<dyn ragcore::Embedder> = Arc::new(OpenAiEmbedder::new(
        &config.llm_answer.api_base,
        &config.llm_answer.api_key,
        config.embedding_model.clone(),
    ));

    let retry = RetryPolicy::from(&config.retry);
    let graph_retriever = Arc::new(GraphRetriever::new(
        router_llm.clone(),
        graph_engine.clone(),
        cypher_index,
        retry.clone(),
        100,
        config.llm_answer.request_timeout,
    ));
    let text_retriever = Arc::new(TextRetriever::new(text_index.clone(), embedder, FusionWeights::default()));
    let router = Arc::new(LlmIntentRouter::new(router_llm));
    let citation_matcher = Arc::new(CitationMatcher::new(citation_llm));
    let sessions = Arc::new(SessionStore::new(cache_store.clone(), row_store.clone(), conversation_index));

    let orchestrator = Arc::new(Orchestrator::new(
        sessions.clone(),
        router,
        graph_retriever,
        text_retriever,
        citation_matcher,
        answer_llm,
        config.prompt.clone(),
        config.features.clone(),
    ));

    let state = serve::AppState { orchestrator, sessions, cache_store, row_store, text_index, graph_engine };
    serve::run_serve(Some(&config.bind_addr), state).await
}
