//! Matches the answering LLM's final text against the knowledge it was given,
//! so the knowledge frame sent to the client only lists what was actually cited.

use std::sync::Arc;

use tracing::warn;

use crate::llm::LlmClient;
use crate::model::KnowledgeHit;

const CITATION_SYSTEM_PROMPT: &str = "You are given a numbered list of knowledge excerpts and an \
answer that was written using some or all of them. Respond with a comma-separated list of the \
numbers that the answer actually draws on, in any order. If none were used, respond with exactly \
`NONE`. Respond with the list only, no explanation.";

fn render_candidates(candidates: &[KnowledgeHit]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}. [{}] {}", i + 1, h.title, h.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_indices(raw: &str, len: usize) -> Vec<usize> {
    if raw.trim().eq_ignore_ascii_case("NONE") {
        return Vec::new();
    }
    raw.split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
        .collect()
}

pub struct CitationMatcher {
    llm: Arc<dyn LlmClient>,
}

impl CitationMatcher {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Returns the subset of `candidates` the answer actually cites. A failed
    /// or unparseable LLM call degrades to returning every candidate
    /// unfiltered rather than silently dropping sources the answer may rely on.
    pub async fn match_citations(&self, answer: &str, candidates: &[KnowledgeHit]) -> Vec<KnowledgeHit> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let user_prompt = format!(
            "Knowledge excerpts:\n{}\n\nAnswer:\n{answer}",
            render_candidates(candidates)
        );

        match self.llm.complete(CITATION_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => {
                let indices = parse_indices(&raw, candidates.len());
                indices.into_iter().map(|i| candidates[i].clone()).collect()
            }
            Err(e) => {
                warn!(error = %e, "citation matching call failed, returning all candidate knowledge unfiltered");
                candidates.to_vec()
            }
        }
    }
}
