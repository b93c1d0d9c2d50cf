//! LLM client abstraction shared by the answering, routing, and citation call sites.
//!
//! A single trait covers all three: routing and citation use [`LlmClient::complete`]
//! (one-shot, no streaming needed), the answering call uses
//! [`LlmClient::stream_chat`] so tokens can be forwarded to the client as `Frame`s
//! as they arrive.

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::OpenAiLlm;

use crate::error::LlmError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// LLM client: one system prompt, one user turn, text in, text out.
///
/// Implementations: `OpenAiLlm` (real API), `MockLlm` (fixed/scripted response).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One-shot completion: returns the full response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Streaming completion: sends each token/delta through `chunk_tx` as it
    /// arrives, and returns the accumulated full text at the end.
    ///
    /// Default implementation calls `complete` and sends the whole response
    /// as a single chunk; used by non-streaming implementations like `MockLlm`.
    async fn stream_chat(
        &self,
        system: &str,
        user: &str,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let content = self.complete(system, user).await?;
        if !content.is_empty() {
            let _ = chunk_tx.send(content.clone()).await;
        }
        Ok(content)
    }
}
