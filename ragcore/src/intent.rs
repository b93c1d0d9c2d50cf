//! Routes one question to a [`RoutingDecision`] via a single LLM call asking
//! it to label the question as `graph`, `text`, `hybrid`, or `none`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{memoize, CacheStats, InMemoryCache};
use crate::error::CacheError;
use crate::llm::LlmClient;
use crate::model::RoutingDecision;

/// How long a routing decision for a given (question, history) pair is
/// reused before the router asks the LLM again.
const ROUTE_CACHE_TTL: Duration = Duration::from_secs(300);

const ROUTER_SYSTEM_PROMPT: &str = "You are a routing classifier for a compliance question-answering \
system. Given the user's question and recent conversation, respond with exactly one word on the \
first line: `graph` if answering requires traversing relationships between regulations, \
obligations, or entities; `text` if it requires looking up regulatory text or guidance; `hybrid` \
if both; `none` if the question needs no retrieval at all (e.g. small talk, a follow-up fully \
answered by the existing conversation).";

#[async_trait]
pub trait IntentRouter: Send + Sync {
    async fn route(&self, question: &str, recent_history: &str) -> RoutingDecision;
}

/// LLM-backed router. Any transport failure or unparseable response degrades
/// to [`RoutingDecision::None`] rather than propagating an error — a missed
/// retrieval opportunity is preferable to failing the whole request.
pub struct LlmIntentRouter {
    llm: Arc<dyn LlmClient>,
    cache: InMemoryCache<String, String>,
}

impl LlmIntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, cache: InMemoryCache::new() }
    }

    /// Usage of the routing-decision memoization cache, for `/api/health/detailed`.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl IntentRouter for LlmIntentRouter {
    async fn route(&self, question: &str, recent_history: &str) -> RoutingDecision {
        let user_prompt = format!("Recent conversation:\n{recent_history}\n\nQuestion: {question}");
        let key_args = (question, recent_history);
        let result = memoize(
            &self.cache,
            "intent_route",
            "route",
            &key_args,
            Some(ROUTE_CACHE_TTL),
            || async {
                self.llm
                    .complete(ROUTER_SYSTEM_PROMPT, &user_prompt)
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))
            },
        )
        .await;

        match result {
            Ok(raw) => RoutingDecision::parse(&raw),
            Err(e) => {
                warn!(error = %e, "intent routing call failed, degrading to RoutingDecision::None");
                RoutingDecision::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    #[tokio::test]
    async fn routes_to_the_label_the_llm_returns() {
        let llm = Arc::new(MockLlm::with_response("hybrid\nbecause both graph and text apply"));
        let router = LlmIntentRouter::new(llm);
        assert_eq!(router.route("what GDPR articles link to this obligation?", "").await, RoutingDecision::Hybrid);
    }

    #[tokio::test]
    async fn degrades_to_none_when_llm_call_fails() {
        let llm = Arc::new(MockLlm::with_response(""));
        let router = LlmIntentRouter::new(llm);
        assert_eq!(router.route("hello", "").await, RoutingDecision::None);
    }

    #[tokio::test]
    async fn degrades_to_none_on_unparseable_response() {
        let llm = Arc::new(MockLlm::with_response("I'm not sure how to classify this"));
        let router = LlmIntentRouter::new(llm);
        assert_eq!(router.route("what is this about?", "").await, RoutingDecision::None);
    }

    #[tokio::test]
    async fn repeated_question_reuses_the_cached_decision() {
        let llm = Arc::new(MockLlm::with_responses(vec!["graph".into(), "text".into()]));
        let router = LlmIntentRouter::new(llm.clone());

        assert_eq!(router.route("what obligations link to GDPR Art. 5?", "").await, RoutingDecision::Graph);
        assert_eq!(router.route("what obligations link to GDPR Art. 5?", "").await, RoutingDecision::Graph);
        assert_eq!(llm.calls_seen().len(), 1);
        assert_eq!(router.cache_stats().hits, 1);
    }
}
