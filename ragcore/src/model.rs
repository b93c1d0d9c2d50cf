//! Core data model shared across the retrieval pipeline and session store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A chat session. Created on demand; soft-deleted via `active = false`.
/// Uniquely keyed by `session_id`; `(user_id, session_id)` is the access path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: i64,
    pub active: bool,
}

/// Role of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// An append-only chat message. No updates; delete only by clearing the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    pub order: i64,
}

/// The four routing labels the intent router may produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingDecision {
    Graph,
    Text,
    Hybrid,
    None,
}

impl RoutingDecision {
    /// Parses the first line of the router LLM's raw output matching
    /// `^(graph|text|hybrid|none)` case-insensitively. Any parse failure
    /// (including no match) degrades to `None` rather than erroring.
    pub fn parse(raw: &str) -> Self {
        static PATTERN: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
            regex::Regex::new(r"(?i)^\s*(graph|text|hybrid|none)\b").unwrap()
        });
        for line in raw.lines() {
            if let Some(caps) = PATTERN.captures(line) {
                return match caps[1].to_lowercase().as_str() {
                    "graph" => RoutingDecision::Graph,
                    "text" => RoutingDecision::Text,
                    "hybrid" => RoutingDecision::Hybrid,
                    _ => RoutingDecision::None,
                };
            }
        }
        RoutingDecision::None
    }
}

/// The kind of retrieval an `Intent` implies, parsed independently by each
/// retriever before it decides to run at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    GraphQuery,
    TextQuery,
    HybridQuery,
}

/// Classification of one question by a retriever's own intent-parsing step.
/// `metadata` carries the generated graph-query-language statement when
/// `kind == GraphQuery`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f32,
    pub metadata: HashMap<String, String>,
}

/// Source a knowledge hit was retrieved from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeSource {
    Graph,
    Text,
}

/// One retrieved knowledge item. Ephemeral — held only for one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub source: KnowledgeSource,
    pub metadata: HashMap<String, String>,
}

/// Request parameters for one streaming query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Hybrid,
    GraphOnly,
    TextOnly,
}

impl Mode {
    /// Maps the wire `scene_id` query param to a `Mode`.
    /// `1=hybrid, 2=graph_only, 3=text_only`; any other value is rejected by the caller.
    pub fn from_scene_id(scene_id: i32) -> Option<Self> {
        match scene_id {
            1 => Some(Mode::Hybrid),
            2 => Some(Mode::GraphOnly),
            3 => Some(Mode::TextOnly),
            _ => None,
        }
    }
}
