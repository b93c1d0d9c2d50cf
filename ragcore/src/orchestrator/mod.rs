//! Orchestrates one streaming chat request: route intent, retrieve knowledge,
//! assemble a prompt, stream the answer, match citations, and persist the turn.

mod hybrid;

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;

use crate::cache::CacheStats;
use crate::citation::CitationMatcher;
use crate::config::{FeatureFlags, PromptConfig};
use crate::intent::LlmIntentRouter;
use crate::llm::LlmClient;
use crate::model::Mode;
use crate::prompt::PromptBuilder;
use crate::retrievers::{GraphRetriever, TextRetriever};
use crate::session::SessionStore;

const DEFAULT_TOP_K: usize = 8;

/// Everything one streaming request needs, constructed once at startup and
/// shared across requests behind `Arc`.
pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    router: Arc<LlmIntentRouter>,
    graph_retriever: Arc<GraphRetriever>,
    text_retriever: Arc<TextRetriever>,
    citation_matcher: Arc<CitationMatcher>,
    answer_llm: Arc<dyn LlmClient>,
    prompt_builder: Arc<PromptBuilder>,
    features: FeatureFlags,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        router: Arc<LlmIntentRouter>,
        graph_retriever: Arc<GraphRetriever>,
        text_retriever: Arc<TextRetriever>,
        citation_matcher: Arc<CitationMatcher>,
        answer_llm: Arc<dyn LlmClient>,
        prompt_config: PromptConfig,
        features: FeatureFlags,
    ) -> Self {
        Self {
            sessions,
            router,
            graph_retriever,
            text_retriever,
            citation_matcher,
            answer_llm,
            prompt_builder: Arc::new(PromptBuilder::new(prompt_config)),
            features,
        }
    }

    /// Streams the answer to one question as a sequence of [`frame::Frame`]s:
    /// zero or more `think` frames, one or more `data` frames, then an
    /// optional `knowledge` frame. Errors encountered mid-stream are surfaced
    /// as a single terminal `error` frame rather than dropping the connection.
    pub fn run(
        self: &Arc<Self>,
        mode: Mode,
        user_id: String,
        session_id: String,
        question: String,
    ) -> ReceiverStream<frame::Frame> {
        let (tx, rx) = tokio::sync::mpsc::channel(hybrid::FRAME_QUEUE_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            hybrid::run_pipeline(orchestrator, mode, user_id, session_id, question, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Usage of the intent router's routing-decision cache, for `/api/health/detailed`.
    pub fn router_cache_stats(&self) -> CacheStats {
        self.router.cache_stats()
    }
}

pub(crate) struct PipelineContext<'a> {
    pub sessions: &'a Arc<SessionStore>,
    pub router: &'a Arc<LlmIntentRouter>,
    pub graph_retriever: &'a Arc<GraphRetriever>,
    pub text_retriever: &'a Arc<TextRetriever>,
    pub citation_matcher: &'a Arc<CitationMatcher>,
    pub answer_llm: &'a Arc<dyn LlmClient>,
    pub prompt_builder: &'a Arc<PromptBuilder>,
    pub features: &'a FeatureFlags,
    pub top_k: usize,
}

impl Orchestrator {
    pub(crate) fn context(&self) -> PipelineContext<'_> {
        PipelineContext {
            sessions: &self.sessions,
            router: &self.router,
            graph_retriever: &self.graph_retriever,
            text_retriever: &self.text_retriever,
            citation_matcher: &self.citation_matcher,
            answer_llm: &self.answer_llm,
            prompt_builder: &self.prompt_builder,
            features: &self.features,
            top_k: DEFAULT_TOP_K,
        }
    }
}
