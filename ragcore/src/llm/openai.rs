//! OpenAI-compatible chat completions client implementing [`LlmClient`].
//!
//! Works against any OpenAI-compatible endpoint (`api_base`), since the
//! compliance-question answering model is frequently hosted on an internal
//! gateway rather than `api.openai.com`.

use async_trait::async_trait;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use super::LlmClient;
use crate::error::LlmError;

/// Chat completions client bound to one model and temperature.
pub struct OpenAiLlm {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiLlm {
    pub fn new(api_base: &str, api_key: &str, model: impl Into<String>, temperature: f32) -> Self {
        let config = OpenAIConfig::new().with_api_base(api_base).with_api_key(api_key);
        Self { client: Client::with_config(config), model: model.into(), temperature }
    }

    fn request_messages(system: &str, user: &str) -> Vec<ChatCompletionRequestMessage> {
        vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(system)),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(user)),
        ]
    }
}

#[async_trait]
impl LlmClient for OpenAiLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::request_messages(system, user));
        args.temperature(self.temperature);
        let request = args
            .build()
            .map_err(|e| LlmError::Transport(format!("request build failed: {e}")))?;

        debug!(model = %self.model, "chat completion request");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default();
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
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::request_messages(system, user));
        args.temperature(self.temperature);
        args.stream(true);
        let request = args
            .build()
            .map_err(|e| LlmError::Transport(format!("request build failed: {e}")))?;

        debug!(model = %self.model, "chat completion stream request");
        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let mut full_content = String::new();
        while let Some(result) = stream.next().await {
            let response = result.map_err(|e| LlmError::Transport(e.to_string()))?;
            for choice in response.choices {
                if let Some(delta) = choice.delta.content {
                    if !delta.is_empty() {
                        full_content.push_str(&delta);
                        let _ = chunk_tx.send(delta).await;
                    }
                }
            }
        }

        if full_content.is_empty() {
            trace!(model = %self.model, "stream produced no content");
            return Err(LlmError::EmptyResponse);
        }
        Ok(full_content)
    }
}
