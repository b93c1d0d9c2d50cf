//! Assembles the final prompt sent to the answering LLM from conversation
//! history, retrieved knowledge, and the current question.

use crate::config::PromptConfig;
use crate::model::{KnowledgeHit, Role, StoredMessage};

/// Number of trailing user/assistant turn pairs kept in the prompt's history
/// section. Anything older is dropped before character truncation runs.
const MAX_HISTORY_TURNS: usize = 2;

/// Strips `<think>...</think>` and `<knowledge>...</knowledge>` blocks a
/// stored assistant message may carry from a prior streamed answer, so the
/// model doesn't re-read its own scratch narration as conversation history.
fn strip_framing_blocks(content: &str) -> String {
    let mut out = content.to_string();
    for tag in ["think", "knowledge"] {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        while let Some(start) = out.find(&open) {
            if let Some(end) = out[start..].find(&close) {
                out.replace_range(start..start + end + close.len(), "");
            } else {
                out.replace_range(start.., "");
                break;
            }
        }
    }
    out.trim().to_string()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().rev().take(max_chars).collect::<Vec<_>>().into_iter().rev().collect()
}

fn render_history(messages: &[StoredMessage], max_chars: usize) -> String {
    let turns = messages.len().min(MAX_HISTORY_TURNS * 2);
    let recent = &messages[messages.len() - turns..];
    let rendered = recent
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{role}: {}", strip_framing_blocks(&m.content))
        })
        .collect::<Vec<_>>()
        .join("\n");
    truncate_chars(&rendered, max_chars)
}

fn render_knowledge(hits: &[KnowledgeHit], max_chars: usize) -> String {
    let rendered = hits
        .iter()
        .map(|h| format!("[{}] {}", h.title, h.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&rendered, max_chars)
}

/// Renders recent history as plain `"Role: content"` lines, capped at 2000
/// chars. Used by the intent router, which needs a short conversational
/// summary rather than the full prompt-assembly truncation limits.
pub(crate) fn recent_history_text(messages: &[StoredMessage]) -> String {
    render_history(messages, 2000)
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Renders the system prompt template, substituting `{history}`,
    /// `{knowledge}`, and `{question}`, then truncates the whole thing to
    /// `max_prompt_chars` from the front (the question, at the end, survives).
    pub fn build(&self, history: &[StoredMessage], question: &str, knowledge: &[KnowledgeHit]) -> String {
        let history_text = render_history(history, self.config.max_history_chars);
        let knowledge_text = render_knowledge(knowledge, self.config.max_knowledge_chars);

        let prompt = self
            .config
            .system_template
            .replace("{history}", &history_text)
            .replace("{knowledge}", &knowledge_text)
            .replace("{question}", question);

        if prompt.chars().count() <= self.config.max_prompt_chars {
            prompt
        } else {
            truncate_chars(&prompt, self.config.max_prompt_chars)
        }
    }
}
