//! Mock LLM for tests: returns scripted responses in order, one per call.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::LlmClient;
use crate::error::LlmError;

/// Returns each entry of `responses` in turn, repeating the last one once exhausted.
/// `stream_by_char` makes `stream_chat` send one chunk per character instead of
/// one chunk for the whole response, useful for exercising incremental consumers.
pub struct MockLlm {
    responses: Vec<String>,
    call_count: AtomicUsize,
    stream_by_char: AtomicBool,
    calls_seen: Mutex<Vec<(String, String)>>,
}

impl MockLlm {
    pub fn with_response(content: impl Into<String>) -> Self {
        Self::with_responses(vec![content.into()])
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            stream_by_char: AtomicBool::new(false),
            calls_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stream_by_char(mut self) -> Self {
        *self.stream_by_char.get_mut() = true;
        self
    }

    /// The `(system, user)` pairs passed to every call so far, in order.
    pub fn calls_seen(&self) -> Vec<(String, String)> {
        self.calls_seen.lock().unwrap().clone()
    }

    fn next_response(&self) -> String {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(n)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls_seen.lock().unwrap().push((system.to_string(), user.to_string()));
        let content = self.next_response();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }

    async fn stream_chat(
        &self,
        system: &str,
        user: &str,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let content = self.complete(system, user).await?;
        if self.stream_by_char.load(Ordering::SeqCst) {
            for c in content.chars() {
                let _ = chunk_tx.send(c.to_string()).await;
            }
        } else {
            let _ = chunk_tx.send(content.clone()).await;
        }
        Ok(content)
    }
}
