//! # ragcore
//!
//! Streaming retrieval-augmented chat pipeline for a compliance/regulation
//! assistant: intent routing picks a retrieval path, the graph and text
//! retrievers run concurrently, a prompt is assembled from the result, the
//! answer streams token-by-token, and citations are matched against what was
//! actually used before the turn is persisted.
//!
//! ## Main modules
//!
//! - [`model`]: shared data types (`Session`, `StoredMessage`, `KnowledgeHit`, `Mode`, ...).
//! - [`config`]: [`AppConfig`] — the full environment-variable surface.
//! - [`error`]: one `thiserror` enum per concern ([`CoreError`], [`DatabaseError`], ...).
//! - [`cache`]: [`Cache`] trait, [`InMemoryCache`], [`cache::memoize`].
//! - [`retry`]: [`RetryPolicy`], [`with_retry`].
//! - [`llm`]: [`LlmClient`] trait, [`OpenAiLlm`], [`MockLlm`].
//! - [`embedding`]: [`Embedder`] trait, [`OpenAiEmbedder`].
//! - [`adapters`]: external-service adapters (row store, cache store, text index, graph engine).
//! - [`session`]: [`SessionStore`] — three-tier session and message persistence.
//! - [`intent`]: [`IntentRouter`] trait, [`LlmIntentRouter`].
//! - [`retrievers`]: [`GraphRetriever`], [`TextRetriever`].
//! - [`prompt`]: [`PromptBuilder`].
//! - [`citation`]: [`CitationMatcher`].
//! - [`orchestrator`]: [`Orchestrator`] — ties every stage together into one streamed request.

pub mod adapters;
pub mod cache;
pub mod citation;
pub mod config;
pub mod embedding;
pub mod error;
pub mod intent;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod retrievers;
pub mod retry;
pub mod session;

pub use adapters::{CacheStore, EsTextIndex, GraphEngine, Neo4jGraphEngine, RedisCacheStore, RowStore, SqliteRowStore, TextIndex};
pub use cache::{Cache, CacheStats, InMemoryCache};
pub use citation::CitationMatcher;
pub use config::{AppConfig, LogRotation};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use error::CoreError;
pub use intent::{IntentRouter, LlmIntentRouter};
pub use llm::{LlmClient, MockLlm, OpenAiLlm};
pub use model::{Intent, IntentKind, KnowledgeHit, KnowledgeSource, Mode, Role, RoutingDecision, Session, StoredMessage};
pub use orchestrator::Orchestrator;
pub use prompt::PromptBuilder;
pub use retrievers::{FusionWeights, GraphRetriever, TextRetriever};
pub use retry::{with_retry, RetryPolicy};
pub use session::SessionStore;
