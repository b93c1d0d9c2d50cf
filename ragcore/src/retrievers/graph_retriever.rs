//! Graph-backed retrieval: turns a question into a Cypher statement (primed
//! with similar prior questions), executes it against the graph engine, and
//! streams a natural-language summary of the result rows.
//!
//! Unlike [`super::TextRetriever`], this retriever owns its own framed
//! output: it emits a `<think>...</think>` block narrating how it got to a
//! statement, followed by a `<data>...</data>` block carrying the streamed
//! summary. Callers that want the answer text alone can read it back off the
//! returned string; callers that want to show the narration too forward the
//! frames as they arrive on `tx`.

use std::sync::Arc;
use std::time::Duration;

use frame::Frame;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use crate::adapters::graph_engine::GraphRow;
use crate::adapters::{GraphEngine, TextIndex};
use crate::error::GraphEngineError;
use crate::llm::LlmClient;
use crate::retry::{with_retry, RetryPolicy};

const QUERY_GEN_SYSTEM_PROMPT: &str = "You translate a compliance question into a single read-only \
Cypher statement against a graph of regulations, obligations, and the entities they govern. You may \
be given similar prior questions paired with the statement that answered them; use them as style and \
schema hints. Respond with the statement only, no explanation and no markdown fencing. If the question \
does not need graph traversal, respond with exactly `NONE`.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are given the rows a graph query returned for a compliance \
question. Write a concise natural-language summary of what they show, in the same language as the \
question. If there are no rows, say plainly that the graph has no matching record.";

const DEFAULT_FEW_SHOT_TOP_K: usize = 3;

fn is_retryable(err: &GraphEngineError) -> bool {
    matches!(err, GraphEngineError::Timeout)
}

/// Renders one graph row as `"key: value, key: value"`, stable key order.
fn render_row(row: &GraphRow) -> String {
    row.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join(", ")
}

fn render_rows(rows: &[GraphRow]) -> String {
    rows.iter().map(render_row).collect::<Vec<_>>().join("\n")
}

/// Renders up to `top_k` `(question, cypher)` pairs as few-shot priming text,
/// empty when no similar prior questions were found.
fn render_few_shot(examples: &[crate::model::KnowledgeHit]) -> String {
    if examples.is_empty() {
        return String::new();
    }
    let rendered = examples
        .iter()
        .map(|e| format!("Q: {}\nCypher: {}", e.title, e.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Similar prior questions:\n{rendered}\n\n")
}

/// Sends a frame on a channel that should never apply backpressure to the
/// retriever; failures (receiver dropped) are not fatal here, only upstream.
fn emit(tx: &mpsc::UnboundedSender<Frame>, frame: Frame) {
    let _ = tx.send(frame);
}

pub struct GraphRetriever {
    llm: Arc<dyn LlmClient>,
    engine: Arc<dyn GraphEngine>,
    cypher_index: Arc<dyn TextIndex>,
    retry: RetryPolicy,
    row_limit: usize,
    few_shot_top_k: usize,
    query_timeout: Duration,
}

impl GraphRetriever {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        engine: Arc<dyn GraphEngine>,
        cypher_index: Arc<dyn TextIndex>,
        retry: RetryPolicy,
        row_limit: usize,
        query_timeout: Duration,
    ) -> Self {
        Self { llm, engine, cypher_index, retry, row_limit, few_shot_top_k: DEFAULT_FEW_SHOT_TOP_K, query_timeout }
    }

    /// Runs the five-step graph retrieval protocol for `question`, emitting
    /// its own `think`/`data` frame sequence on `tx` as it goes, and returns
    /// the accumulated `data`-block text (empty when no graph answer was
    /// produced). Never returns an error: every failure degrades to a think
    /// note explaining why, logged at the point of failure.
    pub async fn retrieve(&self, question: &str, tx: &mpsc::UnboundedSender<Frame>) -> String {
        emit(tx, Frame::think("<think>"));
        emit(tx, Frame::think("Checking whether the compliance graph can answer this question."));

        let few_shot = match self.cypher_index.search(question, self.few_shot_top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "few-shot cypher lookup failed, generating without examples");
                Vec::new()
            }
        };
        if !few_shot.is_empty() {
            emit(tx, Frame::think(format!("Found {} similar prior graph questions to use as examples.", few_shot.len())));
        }

        let user_prompt = format!("{}Question: {question}", render_few_shot(&few_shot));
        let statement = match self.llm.complete(QUERY_GEN_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "graph query generation failed, skipping graph retrieval");
                emit(tx, Frame::think(format!("Graph query generation failed: {e}")));
                emit(tx, Frame::think("</think>"));
                return String::new();
            }
        };

        if statement.eq_ignore_ascii_case("NONE") || statement.is_empty() {
            emit(tx, Frame::think("This question does not require graph traversal."));
            emit(tx, Frame::think("</think>"));
            return String::new();
        }
        emit(tx, Frame::think(format!("Generated graph query: {statement}")));

        let engine = self.engine.clone();
        let row_limit = self.row_limit;
        let timeout = self.query_timeout;
        let statement_for_retry = statement.clone();
        let result = with_retry(
            &self.retry,
            "graph_execute",
            || {
                let engine = engine.clone();
                let statement = statement_for_retry.clone();
                async move { engine.execute(&statement, &json!({}), row_limit, timeout).await }
            },
            is_retryable,
        )
        .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "graph query execution failed after retries, skipping graph retrieval");
                emit(tx, Frame::think(format!("Graph query execution failed: {e}")));
                emit(tx, Frame::think("</think>"));
                return String::new();
            }
        };
        emit(tx, Frame::think("</think>"));

        emit(tx, Frame::data("<data>"));
        let summary_prompt = format!("Question: {question}\n\nRows:\n{}", render_rows(&rows));
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
        let forward_tx = tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                emit(&forward_tx, Frame::data(chunk));
            }
        });
        let summary = match self.llm.stream_chat(SUMMARY_SYSTEM_PROMPT, &summary_prompt, chunk_tx).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                let fallback = render_rows(&rows);
                let _ = forward.await;
                emit(tx, Frame::data(fallback.clone()));
                emit(tx, Frame::data("</data>"));
                return fallback;
            }
            Err(e) => {
                warn!(error = %e, "graph summary generation failed, falling back to raw rows");
                let fallback = render_rows(&rows);
                let _ = forward.await;
                emit(tx, Frame::data(fallback.clone()));
                emit(tx, Frame::data("</data>"));
                return fallback;
            }
        };
        let _ = forward.await;
        emit(tx, Frame::data("</data>"));
        summary
    }
}
