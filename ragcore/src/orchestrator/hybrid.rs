//! The actual per-request pipeline: routes intent, retrieves knowledge,
//! streams the answer, matches citations, and persists the turn.
//!
//! Runs inside the task spawned by [`super::Orchestrator::run`]; frames are
//! pushed onto `tx` as they become available rather than built up in memory,
//! so the client sees `think` narration before the answer starts streaming.
//! Both conversation turns are persisted only after the stream closes
//! normally — a client disconnect mid-stream (any send on `tx` failing)
//! drops the whole turn rather than leaving a half-written exchange behind.

use std::sync::Arc;

use frame::Frame;
use tokio::sync::mpsc;
use tracing::warn;

use super::{Orchestrator, PipelineContext};
use crate::intent::IntentRouter;
use crate::model::{KnowledgeHit, Mode, Role, RoutingDecision, StoredMessage};
use crate::prompt::recent_history_text;

pub(super) const FRAME_QUEUE_CAPACITY: usize = 64;

/// Per-citation knowledge frame content is capped here; the title is kept
/// whole, only the excerpt body is truncated.
const KNOWLEDGE_CONTENT_CHAR_LIMIT: usize = 500;

/// The literal string the hybrid/hybrid sub-branch appends ahead of the
/// graph summary before re-running the text-answer path.
const GRAPH_CONTEXT_PREFIX: &str = "以下是检索到的具体业务信息：";

async fn send_frame(tx: &mpsc::Sender<Frame>, frame: Frame) -> bool {
    tx.send(frame).await.is_ok()
}

async fn fail(tx: &mpsc::Sender<Frame>, message: impl Into<String>) {
    let _ = tx.send(Frame::error(message.into())).await;
}

/// Narration log for the answering path's own `<think>...</think>` block.
/// `open`/`emit`/`close` all report whether the send succeeded so callers can
/// bail out the moment the client disconnects instead of continuing to do
/// retrieval and LLM work nobody will see.
struct ThinkLog {
    entries: Vec<String>,
}

impl ThinkLog {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    async fn open(&mut self, tx: &mpsc::Sender<Frame>) -> bool {
        send_frame(tx, Frame::think("<think>")).await
    }

    async fn emit(&mut self, tx: &mpsc::Sender<Frame>, text: impl Into<String>) -> bool {
        let text = text.into();
        self.entries.push(text.clone());
        send_frame(tx, Frame::think(text)).await
    }

    async fn close(&mut self, tx: &mpsc::Sender<Frame>) -> bool {
        send_frame(tx, Frame::think("</think>")).await
    }

    fn joined(&self) -> String {
        self.entries.join("\n")
    }
}

/// Tracks position inside an inner frame stream (the graph retriever's own
/// `<think>`/`<data>` framed output) so a nested mode can strip, forward, or
/// capture pieces of it. Tag-bearing frames are consumed by the state
/// transition and never themselves forwarded or captured.
#[derive(Default)]
struct TagFilter {
    in_think: bool,
    in_data: bool,
}

impl TagFilter {
    /// Returns the frame's content when it sits inside an inner `<data>`
    /// block; `None` for tag markers themselves and for anything inside an
    /// inner `<think>` block.
    fn step(&mut self, frame: &Frame) -> Option<String> {
        match frame.content.as_str() {
            "<think>" => {
                self.in_think = true;
                None
            }
            "</think>" => {
                self.in_think = false;
                None
            }
            "<data>" => {
                self.in_data = true;
                None
            }
            "</data>" => {
                self.in_data = false;
                None
            }
            _ if self.in_think => None,
            _ if self.in_data => Some(frame.content.clone()),
            _ => None,
        }
    }
}

fn truncate_to_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

fn render_citation_line(hit: &KnowledgeHit) -> String {
    format!("[{}] {}", hit.title, truncate_to_chars(&hit.content, KNOWLEDGE_CONTENT_CHAR_LIMIT))
}

fn citations_block_text(cited: &[KnowledgeHit]) -> String {
    cited.iter().map(render_citation_line).collect::<Vec<_>>().join("\n")
}

/// Sends one `knowledge` frame per cited hit, bracketed by literal
/// `<knowledge>`/`</knowledge>` marker frames. A no-op (and `true`) when
/// nothing was cited.
async fn emit_knowledge_frames(tx: &mpsc::Sender<Frame>, cited: &[KnowledgeHit]) -> bool {
    if cited.is_empty() {
        return true;
    }
    if !send_frame(tx, Frame::knowledge("<knowledge>")).await {
        return false;
    }
    for hit in cited {
        if !send_frame(tx, Frame::knowledge(render_citation_line(hit))).await {
            return false;
        }
    }
    send_frame(tx, Frame::knowledge("</knowledge>")).await
}

/// Resolves which retrieval path `Mode::Hybrid` should take, consulting the
/// LLM router only when it's enabled; the router's own failures already
/// degrade to `RoutingDecision::None` internally.
async fn resolve_routing(ctx: &PipelineContext<'_>, question: &str, recent_history: &str) -> RoutingDecision {
    if !ctx.features.intent_parser_enabled {
        return RoutingDecision::Hybrid;
    }
    ctx.router.route(question, recent_history).await
}

/// Runs the graph retriever into a private channel and drains it, so a
/// caller can post-process the frame sequence before (or instead of)
/// forwarding it to the client.
async fn collect_graph_frames(ctx: &PipelineContext<'_>, question: &str) -> (Vec<Frame>, String) {
    let (inner_tx, mut inner_rx) = mpsc::unbounded_channel::<Frame>();
    let data_text = ctx.graph_retriever.retrieve(question, &inner_tx).await;
    drop(inner_tx);
    let mut frames = Vec::new();
    while let Ok(frame) = inner_rx.try_recv() {
        frames.push(frame);
    }
    (frames, data_text)
}

/// `Mode::GraphOnly`: skips the answering LLM entirely, streaming the graph
/// retriever's own think/data framed output as-is. Only the data portion is
/// persisted as the assistant turn.
async fn run_graph_only(ctx: &PipelineContext<'_>, question: &str, tx: &mpsc::Sender<Frame>) -> Option<String> {
    if !ctx.features.knowledge_retrieval_enabled {
        fail(tx, "graph retrieval is disabled").await;
        return None;
    }

    let (frames, data_text) = collect_graph_frames(ctx, question).await;
    for frame in frames {
        if !send_frame(tx, frame).await {
            return None;
        }
    }
    Some(data_text)
}

/// `Mode::Hybrid` routed to `RoutingDecision::Graph`: strips the graph
/// retriever's inner `<think>...</think>` narration from the wire, forwards
/// only its data portion (rewrapped in a fresh `<data>...</data>` block), and
/// uses that as the final answer — no separate answering-LLM call runs.
async fn run_hybrid_graph(ctx: &PipelineContext<'_>, think: &mut ThinkLog, tx: &mpsc::Sender<Frame>, question: &str) -> Option<String> {
    if !think.emit(tx, "Searching the compliance knowledge graph.").await {
        return None;
    }
    if !think.close(tx).await {
        return None;
    }

    let (frames, data_text) = collect_graph_frames(ctx, question).await;

    let mut filter = TagFilter::default();
    let mut opened_data = false;
    for frame in &frames {
        if let Some(content) = filter.step(frame) {
            if !opened_data {
                if !send_frame(tx, Frame::data("<data>")).await {
                    return None;
                }
                opened_data = true;
            }
            if !send_frame(tx, Frame::data(content)).await {
                return None;
            }
        }
    }
    if opened_data && !send_frame(tx, Frame::data("</data>")).await {
        return None;
    }

    Some(data_text)
}

/// `Mode::Hybrid` routed to `RoutingDecision::Hybrid`: runs the graph
/// retriever entirely out of the client's view, captures its inner `<data>`
/// content into a scratch buffer via the same tag-filtering state machine,
/// appends that buffer to the question, then runs the ordinary text-answer
/// path against the augmented question.
async fn run_hybrid_hybrid(
    ctx: &PipelineContext<'_>,
    think: &mut ThinkLog,
    tx: &mpsc::Sender<Frame>,
    history: &[StoredMessage],
    question: &str,
) -> Option<String> {
    if !think.emit(tx, "Searching the compliance knowledge graph for supporting detail.").await {
        return None;
    }

    let (frames, _) = collect_graph_frames(ctx, question).await;
    let mut filter = TagFilter::default();
    let mut buffer = String::new();
    for frame in &frames {
        if let Some(content) = filter.step(frame) {
            buffer.push_str(&content);
        }
    }

    let augmented_question =
        if buffer.is_empty() { question.to_string() } else { format!("{question}\n{GRAPH_CONTEXT_PREFIX}{buffer}") };

    run_common_answer(ctx, think, tx, history, &augmented_question, RoutingDecision::Text).await
}

/// Shared tail of `Mode::TextOnly`, `Mode::Hybrid` routed to `Text`/`None`,
/// and the hybrid/hybrid sub-branch once it has an (possibly augmented)
/// question: optional text retrieval, the streamed answer, citation
/// matching, and per-citation knowledge frames.
async fn run_common_answer(
    ctx: &PipelineContext<'_>,
    think: &mut ThinkLog,
    tx: &mpsc::Sender<Frame>,
    history: &[StoredMessage],
    question: &str,
    routing: RoutingDecision,
) -> Option<String> {
    let knowledge = match routing {
        RoutingDecision::None => Vec::new(),
        _ if !ctx.features.knowledge_retrieval_enabled => Vec::new(),
        _ => {
            if !think.emit(tx, "Searching regulatory text and guidance.").await {
                return None;
            }
            ctx.text_retriever.retrieve(question, ctx.top_k).await
        }
    };

    if !think.emit(tx, "Composing the answer.").await {
        return None;
    }
    if !think.close(tx).await {
        return None;
    }

    let prompt = ctx.prompt_builder.build(history, question, &knowledge);

    if !send_frame(tx, Frame::data("<data>")).await {
        return None;
    }

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
    let forward_tx = tx.clone();
    let forward_handle = tokio::spawn(async move {
        let mut ok = true;
        while let Some(chunk) = chunk_rx.recv().await {
            if ok && forward_tx.send(Frame::data(chunk)).await.is_err() {
                ok = false;
            }
        }
        ok
    });

    let answer = match ctx.answer_llm.stream_chat("", &prompt, chunk_tx).await {
        Ok(text) => text,
        Err(e) => {
            let _ = forward_handle.await;
            fail(tx, format!("the answering model failed: {e}")).await;
            return None;
        }
    };
    let forwarded_ok = forward_handle.await.unwrap_or(false);
    if !forwarded_ok {
        return None;
    }
    if !send_frame(tx, Frame::data("</data>")).await {
        return None;
    }

    let cited = if ctx.features.knowledge_matching_enabled && !knowledge.is_empty() {
        ctx.citation_matcher.match_citations(&answer, &knowledge).await
    } else {
        knowledge
    };

    if !emit_knowledge_frames(tx, &cited).await {
        return None;
    }

    let knowledge_block = citations_block_text(&cited);
    let persisted = if knowledge_block.is_empty() {
        format!("<think>{}</think>{answer}", think.joined())
    } else {
        format!("<think>{}</think>{answer}<knowledge>{knowledge_block}</knowledge>", think.joined())
    };
    Some(persisted)
}

async fn run_text_only(
    ctx: &PipelineContext<'_>,
    tx: &mpsc::Sender<Frame>,
    history: &[StoredMessage],
    question: &str,
) -> Option<String> {
    let mut think = ThinkLog::new();
    if !think.open(tx).await {
        return None;
    }
    if !think.emit(tx, "Reading the question and recent conversation.").await {
        return None;
    }
    run_common_answer(ctx, &mut think, tx, history, question, RoutingDecision::Text).await
}

async fn run_hybrid(
    ctx: &PipelineContext<'_>,
    tx: &mpsc::Sender<Frame>,
    history: &[StoredMessage],
    question: &str,
) -> Option<String> {
    let mut think = ThinkLog::new();
    if !think.open(tx).await {
        return None;
    }
    if !think.emit(tx, "Reading the question and recent conversation.").await {
        return None;
    }

    if !ctx.features.knowledge_retrieval_enabled {
        return run_common_answer(ctx, &mut think, tx, history, question, RoutingDecision::None).await;
    }

    let recent_history = recent_history_text(history);
    let routing = resolve_routing(ctx, question, &recent_history).await;

    match routing {
        RoutingDecision::Graph => run_hybrid_graph(ctx, &mut think, tx, question).await,
        RoutingDecision::Hybrid => run_hybrid_hybrid(ctx, &mut think, tx, history, question).await,
        RoutingDecision::Text | RoutingDecision::None => {
            run_common_answer(ctx, &mut think, tx, history, question, routing).await
        }
    }
}

pub(super) async fn run_pipeline(
    orchestrator: Arc<Orchestrator>,
    mode: Mode,
    user_id: String,
    session_id: String,
    question: String,
    tx: mpsc::Sender<Frame>,
) {
    let ctx = orchestrator.context();

    let history = match ctx.sessions.get_messages(&user_id, &session_id).await {
        Ok(messages) => messages,
        Err(e) => {
            fail(&tx, format!("could not load conversation history: {e}")).await;
            return;
        }
    };

    let assistant_text = match mode {
        Mode::GraphOnly => run_graph_only(&ctx, &question, &tx).await,
        Mode::TextOnly => run_text_only(&ctx, &tx, &history, &question).await,
        Mode::Hybrid => run_hybrid(&ctx, &tx, &history, &question).await,
    };

    let Some(assistant_text) = assistant_text else {
        return;
    };

    if let Err(e) = ctx.sessions.append_message(&user_id, &session_id, Role::User, &question).await {
        warn!(error = %e, "failed to persist user message after a completed stream");
    }
    if let Err(e) = ctx.sessions.append_message(&user_id, &session_id, Role::Assistant, &assistant_text).await {
        warn!(error = %e, "failed to persist assistant message after a completed stream");
    }
}
