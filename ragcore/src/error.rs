//! Error types for the streaming RAG pipeline.
//!
//! One `thiserror` enum per concern, the way the teacher splits `CacheError`,
//! `ChannelError`, and `RunError` rather than using one monolithic error type.
//! Adapter-local errors convert into [`DatabaseError`] and then into
//! [`CoreError`] via `#[from]`, mirroring `RunError::Execution(#[from] AgentError)`.

use thiserror::Error;

/// Per-backend database error.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("row store error: {0}")]
    RowStore(#[from] RowStoreError),
    #[error("text index error: {0}")]
    TextIndex(#[from] TextIndexError),
    #[error("graph engine error: {0}")]
    GraphEngine(#[from] GraphEngineError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum RowStoreError {
    #[error("row store query failed: {0}")]
    Query(String),
    #[error("row store connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum TextIndexError {
    #[error("text index request failed: {0}")]
    Request(String),
    #[error("text index timeout")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum GraphEngineError {
    #[error("graph engine query failed: {0}")]
    Query(String),
    #[error("graph engine timeout")]
    Timeout,
}

/// Errors from an LLM (answering, routing, or auxiliary) call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    Transport(String),
    #[error("llm timeout")]
    Timeout,
    #[error("llm returned no content")]
    EmptyResponse,
}

/// Malformed routing output from the intent router's LLM call.
/// Always degrades to `RoutingDecision::None`; never surfaced to the caller.
#[derive(Debug, Error)]
#[error("could not parse routing decision from: {0:?}")]
pub struct IntentParseError(pub String);

/// Configuration error: missing or invalid environment configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    Missing(String),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Top-level error surfaced by the orchestrator.
///
/// Retrieval failures are never wrapped into this type: they degrade to an
/// empty knowledge list and are only ever logged, matching the teacher's
/// "recoverable node failure" pattern in `agent::react` rather than a bubbled
/// exception.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    #[error("intent parse error: {0}")]
    IntentParse(#[from] IntentParseError),
}
