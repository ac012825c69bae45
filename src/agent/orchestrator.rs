//! Turn orchestrator.
//!
//! Sequences one turn: relevance checks over the enabled tools, execution of
//! the relevant ones, then a streamed synthesis. Progress is pushed into an
//! `mpsc` channel as [`ProgressEvent`]s in program order.
//!
//! ```text
//! Analyzing ─┬─ no tool, short history ──▶ canned reply ───────────────▶ Done
//!            ├─ no tool ──▶ ContextualSynthesis ───────────────────────▶ Done
//!            └─ tools ────▶ ExecutingTools ──▶ Synthesizing ───────────▶ Done
//! any step ──▶ Errored | Cancelled
//! ```
//!
//! Every outbound call races the turn's [`CancellationToken`]. Cancellation
//! ends the turn quietly: no error event, `Ok` with
//! [`TurnOutcome::Cancelled`].

use std::future::Future;
use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::prompt::PromptSet;
use super::provider::{DeltaStream, LlmProvider};
use super::relevance::RelevanceAnalyzer;
use super::synthesizer::ResponseSynthesizer;
use super::tool::{Tool, ToolQuery};
use crate::core::{Artifact, Message, ProgressEvent, RelevanceDecision, Role, ToolResult};
use crate::error::AgentError;

/// Events buffered between the orchestrator and its consumer.
const EVENT_BUFFER: usize = 16;

const STATUS_ANALYZING: &str = "Analyzing your question";
const STATUS_SYNTHESIZING: &str = "Generating the final answer";
const STATUS_CONTEXTUAL: &str = "Generating an answer from the conversation context";

/// Item type of the event channel.
pub type TurnEvent = Result<ProgressEvent, AgentError>;

/// Producer side of the event channel.
pub type EventSender = mpsc::Sender<TurnEvent>;

/// Per-turn overrides supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Conversation so far. The last entry is the question being asked.
    pub history: Vec<Message>,
    /// Synthesis system prompt. Empty means the configured default.
    pub system_prompt: Option<String>,
    /// Model for this turn. `None` means [`AgentConfig::model`].
    pub model: Option<String>,
    /// Synthesis temperature override.
    pub temperature: Option<f32>,
    /// Synthesis token limit override.
    pub max_tokens: Option<u32>,
}

impl TurnRequest {
    /// Creates a request with no overrides.
    #[must_use]
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// Returns the current question.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidRequest`] if the history is empty or does
    /// not end with a non-empty user message.
    pub fn question(&self) -> Result<&str, AgentError> {
        let last = self.history.last().ok_or_else(|| AgentError::InvalidRequest {
            message: "messages must not be empty".to_string(),
        })?;
        if last.role != Role::User {
            return Err(AgentError::InvalidRequest {
                message: "the last message must come from the user".to_string(),
            });
        }
        if last.content.trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                message: "the last message must not be empty".to_string(),
            });
        }
        Ok(&last.content)
    }

    /// Content of the most recent assistant message before the question.
    fn previous_answer(&self) -> Option<&str> {
        let (_, earlier) = self.history.split_last()?;
        earlier
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content.as_str())
    }

    /// Most recent non-empty artifact set within the trailing `window` messages.
    fn recent_artifacts(&self, window: usize) -> Vec<Artifact> {
        self.history
            .iter()
            .rev()
            .take(window)
            .find(|m| !m.artifacts.is_empty())
            .map(|m| m.artifacts.clone())
            .unwrap_or_default()
    }

    /// Conversation before the question within the trailing `window`
    /// messages, starting at the latest turn that carries artifacts.
    fn recent_turns(&self, window: usize) -> &[Message] {
        let Some((_, earlier)) = self.history.split_last() else {
            return &[];
        };
        let tail = &earlier[earlier.len().saturating_sub(window.saturating_sub(1))..];
        let start = tail
            .iter()
            .rposition(|m| !m.artifacts.is_empty())
            .unwrap_or(0);
        &tail[start..]
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// An answer was synthesized.
    Completed,
    /// No tool applied to a fresh conversation; the fixed reply was sent.
    Canned,
    /// The caller cancelled the turn.
    Cancelled,
}

/// What a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    /// How the turn ended.
    pub outcome: TurnOutcome,
    /// Tools judged relevant, in registration order.
    pub relevant_tools: Vec<String>,
    /// Artifacts from this turn's tools, in execution order.
    pub artifacts: Vec<Artifact>,
    /// Raw tool data from this turn.
    pub data: Vec<Value>,
    /// Concatenated response deltas.
    pub response: String,
}

impl TurnSummary {
    /// Builds the assistant message this turn produced.
    #[must_use]
    pub fn into_message(self, id: impl Into<String>) -> Message {
        let mut message = Message::assistant(id);
        message.content = self.response;
        message.artifacts = self.artifacts;
        message.data = self.data;
        message
    }
}

/// State machine phases, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Analyzing,
    ContextualSynthesis,
    ExecutingTools,
    Synthesizing,
    Done,
    Errored,
    Cancelled,
}

/// Everything a turn accumulates. Owned by exactly one turn.
#[derive(Debug)]
struct TurnAccumulator {
    phase: TurnPhase,
    relevant_tools: Vec<String>,
    results: Vec<ToolResult>,
    artifacts: Vec<Artifact>,
    data: Vec<Value>,
    content: String,
}

impl TurnAccumulator {
    const fn new() -> Self {
        Self {
            phase: TurnPhase::Analyzing,
            relevant_tools: Vec::new(),
            results: Vec::new(),
            artifacts: Vec::new(),
            data: Vec::new(),
            content: String::new(),
        }
    }

    fn advance(&mut self, next: TurnPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "turn phase");
        self.phase = next;
    }

    /// Folds a tool result in and returns the event announcing it.
    fn record(&mut self, result: ToolResult) -> ProgressEvent {
        let text = if result.artifact.is_some() {
            format!("Tool {} returned an artifact", result.tool_name)
        } else {
            format!("Tool {} returned no artifact", result.tool_name)
        };
        let artifacts: Vec<Artifact> = result.artifact.iter().cloned().collect();
        self.artifacts.extend(artifacts.iter().cloned());
        self.data.extend(result.data.iter().cloned());
        let data = result.data.clone();
        self.results.push(result);
        ProgressEvent::ToolExecution {
            text,
            artifacts,
            data,
        }
    }

    fn finish(self, outcome: TurnOutcome) -> TurnSummary {
        TurnSummary {
            outcome,
            relevant_tools: self.relevant_tools,
            artifacts: self.artifacts,
            data: self.data,
            response: self.content,
        }
    }
}

/// Why a turn stopped early.
enum Interrupt {
    Cancelled,
    Failed(AgentError),
}

impl From<AgentError> for Interrupt {
    fn from(e: AgentError) -> Self {
        Self::Failed(e)
    }
}

/// Pushes events unless the turn was cancelled or the consumer went away.
struct Emitter<'a> {
    tx: &'a EventSender,
    cancel: &'a CancellationToken,
}

impl Emitter<'_> {
    async fn emit(&self, event: ProgressEvent) -> Result<(), Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if self.tx.send(Ok(event)).await.is_err() {
            tracing::debug!("event consumer dropped, cancelling turn");
            self.cancel.cancel();
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    async fn guarded<T>(&self, fut: impl Future<Output = T>) -> Result<T, Interrupt> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// Runs turns against a fixed set of enabled tools.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: Arc<PromptSet>,
    tools: Vec<Arc<dyn Tool>>,
    executor: ToolExecutor,
}

impl Orchestrator {
    /// Creates an orchestrator. `tools` must already be in registration order.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
        prompts: Arc<PromptSet>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        let executor = ToolExecutor::new(config.tool_timeout);
        Self {
            provider,
            config,
            prompts,
            tools,
            executor,
        }
    }

    /// Runs one turn, sending progress events into `tx`.
    ///
    /// The request is validated before any event is sent. A closed receiver
    /// cancels the turn.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] for an invalid request, a failed relevance
    /// check or a failed synthesis. Tool failures are not errors.
    pub async fn invoke(
        &self,
        request: &TurnRequest,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<TurnSummary, AgentError> {
        let question = request.question()?;
        let emitter = Emitter { tx, cancel };
        let mut acc = TurnAccumulator::new();

        match self.run(request, question, &emitter, &mut acc).await {
            Ok(outcome) => {
                acc.advance(TurnPhase::Done);
                tracing::info!(
                    ?outcome,
                    tools = acc.relevant_tools.len(),
                    artifacts = acc.artifacts.len(),
                    "turn finished"
                );
                Ok(acc.finish(outcome))
            }
            Err(Interrupt::Cancelled) => {
                acc.advance(TurnPhase::Cancelled);
                tracing::info!("turn cancelled");
                Ok(acc.finish(TurnOutcome::Cancelled))
            }
            Err(Interrupt::Failed(e)) => {
                acc.advance(TurnPhase::Errored);
                tracing::warn!(error = %e, "turn failed");
                Err(e)
            }
        }
    }

    /// Runs a turn to completion and returns the assistant message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the turn fails or produces no content.
    pub async fn call(&self, request: &TurnRequest) -> Result<Message, AgentError> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let produce = async move {
            let result = self.invoke(request, &tx, &cancel).await;
            drop(tx);
            result
        };
        let drain = async {
            while let Some(event) = rx.recv().await {
                tracing::trace!(?event, "event");
            }
        };
        let (summary, ()) = tokio::join!(produce, drain);

        let summary = summary?;
        if summary.response.is_empty() {
            return Err(AgentError::Orchestration {
                message: "turn produced no content".to_string(),
            });
        }
        Ok(summary.into_message(Message::new_id()))
    }

    async fn run(
        &self,
        request: &TurnRequest,
        question: &str,
        emitter: &Emitter<'_>,
        acc: &mut TurnAccumulator,
    ) -> Result<TurnOutcome, Interrupt> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        emitter.emit(ProgressEvent::status(STATUS_ANALYZING)).await?;

        let decisions = emitter
            .guarded(self.analyze_all(model, question, request.previous_answer()))
            .await??;
        let relevant: Vec<(&Arc<dyn Tool>, RelevanceDecision)> = self
            .tools
            .iter()
            .zip(decisions)
            .filter(|(_, d)| d.is_relevant)
            .collect();
        acc.relevant_tools = relevant.iter().map(|(t, _)| t.name().to_string()).collect();

        let synthesizer = self.synthesizer(request, model);

        if relevant.is_empty() {
            if request.history.len() < self.config.context_min_history {
                let reply = self.prompts.fallback.clone();
                emitter
                    .emit(ProgressEvent::Response {
                        text_delta: reply.clone(),
                        artifacts: Vec::new(),
                    })
                    .await?;
                acc.content = reply;
                return Ok(TurnOutcome::Canned);
            }

            acc.advance(TurnPhase::ContextualSynthesis);
            emitter.emit(ProgressEvent::status(STATUS_CONTEXTUAL)).await?;
            let window = self.config.context_window;
            let artifacts = request.recent_artifacts(window);
            let deltas = emitter
                .guarded(synthesizer.stream_contextual_answer(
                    self.provider.as_ref(),
                    request.recent_turns(window),
                    question,
                    &artifacts,
                ))
                .await??;
            Self::stream_response(deltas, emitter, acc).await?;
            return Ok(TurnOutcome::Completed);
        }

        acc.advance(TurnPhase::ExecutingTools);
        emitter
            .emit(ProgressEvent::status(format!(
                "Using: {}",
                acc.relevant_tools.join(", ")
            )))
            .await?;

        for (tool, decision) in relevant {
            emitter
                .emit(ProgressEvent::status(format!(
                    "Waiting on tool {}",
                    tool.name()
                )))
                .await?;
            let query = ToolQuery {
                question: question.to_string(),
                search_query: decision.derived_query,
            };
            let result = emitter
                .guarded(self.executor.execute(tool.as_ref(), &query))
                .await?;
            let event = acc.record(result);
            emitter.emit(event).await?;
        }

        acc.advance(TurnPhase::Synthesizing);
        emitter.emit(ProgressEvent::status(STATUS_SYNTHESIZING)).await?;
        let deltas = emitter
            .guarded(synthesizer.stream_answer(self.provider.as_ref(), question, &acc.results))
            .await??;
        Self::stream_response(deltas, emitter, acc).await?;
        Ok(TurnOutcome::Completed)
    }

    /// Checks every tool; results come back in registration order.
    async fn analyze_all(
        &self,
        model: &str,
        question: &str,
        previous_answer: Option<&str>,
    ) -> Result<Vec<RelevanceDecision>, AgentError> {
        let analyzer = RelevanceAnalyzer::new(&self.config, model, self.prompts.relevance.clone());
        let provider = self.provider.as_ref();

        let checks: Vec<_> = self
            .tools
            .iter()
            .map(|tool| analyzer.analyze(provider, question, tool.descriptor(), previous_answer))
            .collect();
        stream::iter(checks)
            .buffered(self.config.relevance_concurrency)
            .try_collect()
            .await
    }

    fn synthesizer(&self, request: &TurnRequest, model: &str) -> ResponseSynthesizer {
        let system_prompt = request
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.prompts.synthesizer.clone());
        ResponseSynthesizer::new(&self.config, model, system_prompt)
            .with_temperature(request.temperature)
            .with_max_tokens(request.max_tokens)
    }

    /// Forwards non-empty deltas, each with the turn's artifacts so far.
    async fn stream_response(
        mut deltas: DeltaStream,
        emitter: &Emitter<'_>,
        acc: &mut TurnAccumulator,
    ) -> Result<(), Interrupt> {
        while let Some(delta) = emitter.guarded(deltas.next()).await? {
            let delta = delta?;
            if delta.is_empty() {
                continue;
            }
            emitter
                .emit(ProgressEvent::Response {
                    text_delta: delta.clone(),
                    artifacts: acc.artifacts.clone(),
                })
                .await?;
            acc.content.push_str(&delta);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Runs a turn on a background task and returns its event stream.
///
/// A failure after validation arrives as a final `Err` item. Nothing follows
/// a cancellation. The task inherits the caller's tracing span.
pub fn spawn_turn(
    orchestrator: Arc<Orchestrator>,
    request: TurnRequest,
    cancel: CancellationToken,
) -> ReceiverStream<TurnEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(
        async move {
            if let Err(e) = orchestrator.invoke(&request, &tx, &cancel).await
                && !cancel.is_cancelled()
            {
                let _ = tx.send(Err(e)).await;
            }
        }
        .in_current_span(),
    );
    ReceiverStream::new(rx)
}
